//! Core types shared across the reconciliation engine.

/// RecordId: store-local primary key of a record. Never comparable across stores.
pub type RecordId = i64;

/// AttributeSetId: selects which attribute definitions apply to a record
pub type AttributeSetId = i64;

/// AttributeId: store-local id of one attribute definition
pub type AttributeId = i64;

/// ModuleId: key into the module table referenced by module-typed attributes
pub type ModuleId = i64;

/// Separator between record names in a path. The root path is the separator alone.
pub const PATH_SEPARATOR: char = '/';

/// Parent id that marks a record as having no parent (ProcessWire stores 0 for the root).
pub const ROOT_PARENT_SENTINEL: RecordId = 0;

/// Which side of the comparison a store sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Target => "target",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
