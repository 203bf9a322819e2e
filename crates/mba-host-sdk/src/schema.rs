//! Schema definitions contributed by the bootstrapper extension
//!
//! A plain lookup table consulted by build tooling. The host itself never
//! reads it.

use std::fmt;
use std::str::FromStr;

/// Version of the definition set
pub const SCHEMA_VERSION: &str = "4.0.0";

/// Definition types known to the extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaDefinitionType {
    WixBalBAFunctions,
    WixBalCondition,
    WixMbaPrereqInformation,
    WixStdbaOptions,
    WixStdbaOverridableVariable,
}

/// Kind of value a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaField {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// A named definition and its fields
#[derive(Debug, PartialEq, Eq)]
pub struct SchemaDefinition {
    pub name: &'static str,
    pub fields: &'static [SchemaField],
}

const fn string(name: &'static str) -> SchemaField {
    SchemaField {
        name,
        kind: FieldKind::String,
    }
}

const fn number(name: &'static str) -> SchemaField {
    SchemaField {
        name,
        kind: FieldKind::Number,
    }
}

static BA_FUNCTIONS: SchemaDefinition = SchemaDefinition {
    name: "WixBalBAFunctions",
    fields: &[string("PayloadId")],
};

static CONDITION: SchemaDefinition = SchemaDefinition {
    name: "WixBalCondition",
    fields: &[string("Condition"), string("Message")],
};

static PREREQ_INFORMATION: SchemaDefinition = SchemaDefinition {
    name: "WixMbaPrereqInformation",
    fields: &[string("PackageId"), string("LicenseFile"), string("LicenseUrl")],
};

static STDBA_OPTIONS: SchemaDefinition = SchemaDefinition {
    name: "WixStdbaOptions",
    fields: &[
        number("SuppressOptionsUI"),
        number("SuppressDowngradeFailure"),
        number("SuppressRepair"),
        number("ShowVersion"),
        number("SupportCacheOnly"),
    ],
};

static OVERRIDABLE_VARIABLE: SchemaDefinition = SchemaDefinition {
    name: "WixStdbaOverridableVariable",
    fields: &[string("Name")],
};

impl SchemaDefinitionType {
    pub const ALL: [SchemaDefinitionType; 5] = [
        SchemaDefinitionType::WixBalBAFunctions,
        SchemaDefinitionType::WixBalCondition,
        SchemaDefinitionType::WixMbaPrereqInformation,
        SchemaDefinitionType::WixStdbaOptions,
        SchemaDefinitionType::WixStdbaOverridableVariable,
    ];

    pub fn definition(self) -> &'static SchemaDefinition {
        match self {
            SchemaDefinitionType::WixBalBAFunctions => &BA_FUNCTIONS,
            SchemaDefinitionType::WixBalCondition => &CONDITION,
            SchemaDefinitionType::WixMbaPrereqInformation => &PREREQ_INFORMATION,
            SchemaDefinitionType::WixStdbaOptions => &STDBA_OPTIONS,
            SchemaDefinitionType::WixStdbaOverridableVariable => &OVERRIDABLE_VARIABLE,
        }
    }
}

impl fmt::Display for SchemaDefinitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.definition().name)
    }
}

impl FromStr for SchemaDefinitionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SchemaDefinitionType::ALL
            .into_iter()
            .find(|t| t.definition().name == s)
            .ok_or(())
    }
}

/// Look up a definition by its type name
pub fn by_name(name: &str) -> Option<&'static SchemaDefinition> {
    name.parse::<SchemaDefinitionType>()
        .ok()
        .map(SchemaDefinitionType::definition)
}
