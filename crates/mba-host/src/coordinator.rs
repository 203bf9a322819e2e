//! Execution coordinator
//!
//! Runs the bootstrapper application on one dedicated thread and hands the
//! native caller a [`RunHandle`] to wait on.
//!
//! The BA thread is spawned parked on a start gate. Only after the spawn
//! succeeded does the coordinator write the thread-creation line and open
//! the gate, so no BA code runs before that line is in the trace. When the
//! BA is done the thread finalizes the protocol (which writes the shutdown
//! line) and fires a one-shot completion signal; the caller's wait is
//! satisfied by that signal alone.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::oneshot;

use mba_host_sdk::{BootstrapperApplication, Engine, LogLevel, ShutdownAction, ShutdownResult};

use crate::engine::HostedEngine;
use crate::error::HostError;
use crate::loader::{panic_message, LoadedModule};
use crate::shutdown::{ProtocolPhase, ProtocolViolation, ShutdownProtocol, ThreadExit};
use crate::trace::{RunId, Trace, CREATING_THREAD_MESSAGE};

/// Starts the BA thread for one run
pub struct ExecutionCoordinator {
    run_id: RunId,
    engine: Arc<HostedEngine>,
}

impl ExecutionCoordinator {
    pub fn new(run_id: RunId, engine: Arc<HostedEngine>) -> Self {
        Self { run_id, engine }
    }

    /// Spawn the BA thread and return as soon as it is committed to start
    ///
    /// `module` is the module the BA's code lives in; the thread keeps it
    /// loaded until the BA has been dropped.
    pub fn start(
        self,
        ba: Box<dyn BootstrapperApplication>,
        module: Option<Arc<LoadedModule>>,
    ) -> Result<RunHandle, HostError> {
        let protocol = self.engine.protocol().clone();
        let (gate_tx, gate_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel::<ShutdownResult>();

        let thread_protocol = protocol.clone();
        let run_id = self.run_id;
        let join = thread::Builder::new()
            .name(format!("mba-{}", run_id))
            .spawn(move || {
                // The module must be released after the BA, which is dropped in `run_ba`.
                let _module = module;
                run_ba(run_id, ba, thread_protocol, gate_rx, done_tx);
            })
            .map_err(HostError::ThreadSpawn)?;

        self.engine.log(LogLevel::Standard, CREATING_THREAD_MESSAGE);
        protocol.mark_running();

        if gate_tx.send(()).is_err() {
            // Only possible if the thread already died; the completion
            // channel reports that to the waiter.
            tracing::error!(run_id = %run_id, "BA thread exited before it was started");
        }

        Ok(RunHandle {
            run_id,
            trace: self.engine.trace().clone(),
            protocol,
            completion: done_rx,
            thread: Some(join),
        })
    }
}

fn run_ba(
    run_id: RunId,
    mut ba: Box<dyn BootstrapperApplication>,
    protocol: ShutdownProtocol,
    gate: oneshot::Receiver<()>,
    done: oneshot::Sender<ShutdownResult>,
) {
    if gate.blocking_recv().is_err() {
        tracing::error!(run_id = %run_id, "Start gate dropped, BA not run");
        return;
    }

    tracing::debug!(run_id = %run_id, "BA thread running");

    let exit = match panic::catch_unwind(AssertUnwindSafe(|| ba.run())) {
        Ok(Ok(())) => ThreadExit::Returned,
        Ok(Err(e)) => {
            tracing::error!(run_id = %run_id, error = %e, "Bootstrapper application failed");
            ThreadExit::Faulted(e.to_string())
        }
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            tracing::error!(run_id = %run_id, panic = %reason, "Bootstrapper application panicked");
            ThreadExit::Faulted(reason)
        }
    };

    let closed = protocol.close(&exit);
    if panic::catch_unwind(AssertUnwindSafe(|| ba.on_shutdown(&closed))).is_err() {
        tracing::warn!(run_id = %run_id, "Bootstrapper application panicked in on_shutdown");
    }
    drop(ba);

    let result = protocol.terminate(exit);
    if done.send(result).is_err() {
        tracing::debug!(run_id = %run_id, "Run handle dropped before completion");
    }
}

/// Handle to a running bootstrapper application
pub struct RunHandle {
    run_id: RunId,
    trace: Trace,
    protocol: ShutdownProtocol,
    completion: oneshot::Receiver<ShutdownResult>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn phase(&self) -> ProtocolPhase {
        self.protocol.phase()
    }

    /// Request shutdown on the BA's behalf
    pub fn request_shutdown(&self, action: ShutdownAction, exit_code: i32) -> Result<(), ProtocolViolation> {
        self.protocol.request(action, exit_code)
    }

    /// Block until the run terminates, at most `timeout`
    ///
    /// On timeout the run is terminated with a timed-out result and the BA
    /// thread is left detached. Calling it from inside an async runtime is
    /// a `WaitRuntime` error.
    pub fn wait(mut self, timeout: Duration) -> Result<ShutdownResult, HostError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(HostError::WaitRuntime(std::io::Error::other(
                "cannot block on a BA run from inside an async runtime",
            )));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(HostError::WaitRuntime)?;

        let completion = runtime.block_on(async {
            tokio::time::timeout(timeout, &mut self.completion).await
        });

        let result = match completion {
            Ok(Ok(result)) => {
                if let Some(join) = self.thread.take() {
                    if join.join().is_err() {
                        tracing::warn!(run_id = %self.run_id, "BA thread panicked after completing");
                    }
                }
                result
            }
            Ok(Err(_)) => self
                .protocol
                .terminate(ThreadExit::Faulted("BA thread exited without completing".to_string())),
            Err(_) => {
                tracing::warn!(
                    run_id = %self.run_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "BA thread did not finish in time, detaching"
                );
                self.protocol.terminate(ThreadExit::TimedOut)
            }
        };

        Ok(result)
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.run_id)
            .field("phase", &self.phase())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::hosted_engine;
    use mba_host_sdk::{BaError, EngineHandle, TerminationCause};
    use std::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(10);

    struct ScriptedBa {
        engine: EngineHandle,
        name: &'static str,
        request: Option<(ShutdownAction, i32)>,
        observed: Option<mpsc::Sender<Vec<String>>>,
        trace: Trace,
    }

    impl BootstrapperApplication for ScriptedBa {
        fn run(&mut self) -> Result<(), BaError> {
            if let Some(observed) = &self.observed {
                let _ = observed.send(self.trace.snapshot());
            }
            self.engine.log(LogLevel::Standard, self.name);
            if let Some((action, exit_code)) = self.request {
                self.engine.shutdown(action, exit_code);
            }
            Ok(())
        }
    }

    struct FaultyBa {
        panic: bool,
    }

    impl BootstrapperApplication for FaultyBa {
        fn run(&mut self) -> Result<(), BaError> {
            if self.panic {
                panic!("BA blew up");
            }
            Err(BaError::Run("detect failed".into()))
        }
    }

    /// Tries to change the result after it has been told what it is
    struct LateBa {
        engine: EngineHandle,
        seen: mpsc::Sender<ShutdownResult>,
    }

    impl BootstrapperApplication for LateBa {
        fn run(&mut self) -> Result<(), BaError> {
            Ok(())
        }

        fn on_shutdown(&mut self, result: &ShutdownResult) {
            self.engine.shutdown(ShutdownAction::Restart, 3010);
            let _ = self.seen.send(result.clone());
        }
    }

    struct BlockedBa {
        release: mpsc::Receiver<()>,
    }

    impl BootstrapperApplication for BlockedBa {
        fn run(&mut self) -> Result<(), BaError> {
            let _ = self.release.recv();
            Ok(())
        }
    }

    fn start(ba: Box<dyn BootstrapperApplication>, engine: Arc<HostedEngine>) -> RunHandle {
        ExecutionCoordinator::new(RunId::new(), engine)
            .start(ba, None)
            .unwrap()
    }

    #[test]
    fn test_ba_runs_after_thread_creation_line() {
        let (_native, engine) = hosted_engine();
        let (tx, rx) = mpsc::channel();
        let ba = ScriptedBa {
            engine: engine.clone(),
            name: "ExampleBA",
            request: Some((ShutdownAction::ReloadBootstrapper, 0)),
            observed: Some(tx),
            trace: engine.trace().clone(),
        };

        let handle = start(Box::new(ba), engine.clone());
        let result = handle.wait(WAIT).unwrap();

        assert_eq!(rx.recv().unwrap(), vec![CREATING_THREAD_MESSAGE]);
        assert_eq!(result, ShutdownResult::requested(ShutdownAction::ReloadBootstrapper, 0));
        assert_eq!(
            engine.trace().snapshot(),
            vec![CREATING_THREAD_MESSAGE, "ExampleBA", "Shutdown,ReloadBootstrapper,0"]
        );
    }

    #[test]
    fn test_return_without_shutdown_is_synthesized() {
        let (_native, engine) = hosted_engine();
        let ba = ScriptedBa {
            engine: engine.clone(),
            name: "QuietBA",
            request: None,
            observed: None,
            trace: engine.trace().clone(),
        };

        let result = start(Box::new(ba), engine.clone()).wait(WAIT).unwrap();
        assert_eq!(result, ShutdownResult::no_shutdown_request());
        assert_eq!(engine.trace().last(), Some(result.trace_line()));
    }

    #[test]
    fn test_error_and_panic_are_faults() {
        for panic in [false, true] {
            let (_native, engine) = hosted_engine();
            let result = start(Box::new(FaultyBa { panic }), engine.clone())
                .wait(WAIT)
                .unwrap();

            let expected = if panic {
                "BA blew up"
            } else {
                "Bootstrapper application failed: detect failed"
            };
            assert_eq!(result.cause, TerminationCause::Faulted(expected.to_string()));
            assert_eq!(result.exit_code, mba_host_sdk::shutdown::EXIT_FAULTED);
            assert!(engine.trace().is_sealed());
        }
    }

    #[test]
    fn test_wait_times_out() {
        let (_native, engine) = hosted_engine();
        let (release, blocked) = mpsc::channel();

        let handle = start(Box::new(BlockedBa { release: blocked }), engine.clone());
        let result = handle.wait(Duration::from_millis(50)).unwrap();

        assert_eq!(result, ShutdownResult::timed_out());
        assert_eq!(engine.trace().last(), Some(result.trace_line()));

        // Let the detached thread finish; its result must not replace ours.
        release.send(()).unwrap();
        assert_eq!(engine.protocol().result(), Some(ShutdownResult::timed_out()));
    }

    #[test]
    fn test_engine_requests_shutdown_on_behalf_of_ba() {
        let (_native, engine) = hosted_engine();
        let (release, blocked) = mpsc::channel();

        let handle = start(Box::new(BlockedBa { release: blocked }), engine.clone());
        handle.request_shutdown(ShutdownAction::Restart, 3010).unwrap();
        assert_eq!(handle.phase(), ProtocolPhase::ShutdownRequested);
        release.send(()).unwrap();

        let result = handle.wait(WAIT).unwrap();
        assert_eq!(result, ShutdownResult::requested(ShutdownAction::Restart, 3010));
    }

    #[test]
    fn test_shutdown_from_on_shutdown_is_ignored() {
        let (native, engine) = hosted_engine();
        let (seen_tx, seen_rx) = mpsc::channel();
        let ba = LateBa {
            engine: engine.clone(),
            seen: seen_tx,
        };

        let result = start(Box::new(ba), engine.clone()).wait(WAIT).unwrap();

        assert_eq!(result, ShutdownResult::no_shutdown_request());
        assert_eq!(seen_rx.recv().unwrap(), result);
        assert_eq!(native.shutdown_request(), None);
        assert_eq!(engine.trace().last(), Some(result.trace_line()));
    }

    #[test]
    fn test_wait_inside_async_runtime_is_an_error() {
        let (_native, engine) = hosted_engine();
        let ba = ScriptedBa {
            engine: engine.clone(),
            name: "ExampleBA",
            request: None,
            observed: None,
            trace: engine.trace().clone(),
        };
        let handle = start(Box::new(ba), engine);

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let err = runtime.block_on(async { handle.wait(WAIT) }).unwrap_err();
        assert!(matches!(err, HostError::WaitRuntime(_)));
    }
}
