//! Ordered status trace
//!
//! Every significant lifecycle event of a run is appended here as one line,
//! synchronously at the step that produces it, and mirrored to `tracing`.
//! The order for a successful run is fixed:
//!
//! 1. [`LOADING_MESSAGE`]
//! 2. [`CREATING_THREAD_MESSAGE`]
//! 3. whatever the BA logs (its self-identification first)
//! 4. `Shutdown,<Action>,<ExitCode>`
//!
//! The shutdown line seals the trace; nothing is appended after it.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

pub const LOADING_MESSAGE: &str = "Loading managed bootstrapper application.";
pub const CREATING_THREAD_MESSAGE: &str = "Creating BA thread to run asynchronously.";

/// Identifier of one host invocation, carried in log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
struct TraceBuffer {
    lines: Vec<String>,
    sealed: bool,
}

/// Append-only trace shared between the host and the BA thread
#[derive(Clone, Default)]
pub struct Trace {
    inner: Arc<Mutex<TraceBuffer>>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line. Returns `false` if the trace is already sealed.
    pub fn emit(&self, line: impl Into<String>) -> bool {
        let line = line.into();
        let mut buffer = self.inner.lock();
        if buffer.sealed {
            tracing::debug!(line = %line, "Trace sealed, line dropped");
            return false;
        }
        tracing::info!(target: "mba_host::trace", "{}", line);
        buffer.lines.push(line);
        true
    }

    /// Append the terminal line and seal the trace
    pub(crate) fn emit_terminal(&self, line: impl Into<String>) {
        let line = line.into();
        let mut buffer = self.inner.lock();
        if buffer.sealed {
            return;
        }
        tracing::info!(target: "mba_host::trace", "{}", line);
        buffer.lines.push(line);
        buffer.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.lock().sealed
    }

    /// Copy of every line recorded so far
    pub fn snapshot(&self) -> Vec<String> {
        self.inner.lock().lines.clone()
    }

    pub fn last(&self) -> Option<String> {
        self.inner.lock().lines.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buffer = self.inner.lock();
        f.debug_struct("Trace")
            .field("lines", &buffer.lines.len())
            .field("sealed", &buffer.sealed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_keeps_order_across_clones() {
        let trace = Trace::new();
        let other = trace.clone();

        assert!(trace.emit(LOADING_MESSAGE));
        assert!(other.emit(CREATING_THREAD_MESSAGE));
        assert!(trace.emit("ExampleBA"));

        assert_eq!(
            other.snapshot(),
            vec![LOADING_MESSAGE, CREATING_THREAD_MESSAGE, "ExampleBA"]
        );
    }

    #[test]
    fn test_terminal_line_seals() {
        let trace = Trace::new();
        trace.emit("ExampleBA");
        trace.emit_terminal("Shutdown,None,0");
        trace.emit_terminal("Shutdown,Restart,1");

        assert!(trace.is_sealed());
        assert!(!trace.emit("late"));
        assert_eq!(trace.snapshot(), vec!["ExampleBA", "Shutdown,None,0"]);
        assert_eq!(trace.last().as_deref(), Some("Shutdown,None,0"));
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
