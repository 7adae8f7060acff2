//! Error types for the reconciliation engine.
//!
//! Each component owns its error enum; `ApiError` is the boundary type used by
//! the driver and the CLI.

use crate::types::{AttributeSetId, ModuleId, RecordId};
use thiserror::Error;

/// Errors raised by `KeyedIndex`
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("key field not part of the index key tuple: {0}")]
    InvalidKey(String),

    #[error("lookup key has {given} segments but the index has {defined} key fields")]
    KeyTooLong { given: usize, defined: usize },
}

/// Structural problems in a store's parent/child graph
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("malformed tree: no root record (no record without a parent)")]
    MissingRoot,

    #[error("malformed tree: multiple root records: {0:?}")]
    MultipleRoots(Vec<RecordId>),

    #[error("malformed tree: designated root {designated} is not the parentless record {actual}")]
    RootMismatch {
        designated: RecordId,
        actual: RecordId,
    },

    #[error("malformed tree: record {record_id} references missing parent {parent_id}")]
    OrphanedParent {
        record_id: RecordId,
        parent_id: RecordId,
    },

    #[error("malformed tree: duplicate record id {0}")]
    DuplicateRecord(RecordId),

    /// A non-root name must be one non-empty path segment
    #[error("malformed tree: record {record_id} has invalid name '{name}' (empty or containing '/')")]
    InvalidName { record_id: RecordId, name: String },

    #[error("malformed tree: path {path} assigned to both {first} and {second}")]
    DuplicatePath {
        path: String,
        first: RecordId,
        second: RecordId,
    },

    /// Records that a traversal from the root never reaches (cycles, detached subtrees)
    #[error("{} records unreachable from the root: {ids:?}", ids.len())]
    Unreachable { ids: Vec<RecordId> },
}

impl TreeError {
    /// True for every variant except `Unreachable`, which is reported as its own class.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, TreeError::Unreachable { .. })
    }
}

/// Failure reported by a `RowSource` implementation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("query failed: {0}")]
    Query(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

/// Contained errors raised while resolving attribute values
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unknown attribute type '{type_tag}' for attribute {attribute}")]
    UnknownAttributeType { attribute: String, type_tag: String },

    #[error("record {record_id} attribute {attribute}: expected at most one value row, found {count}")]
    MultipleValueRows {
        record_id: RecordId,
        attribute: String,
        count: usize,
    },

    #[error("cyclic reference: record {record_id} is already being resolved (chain {chain:?})")]
    CyclicReference {
        record_id: RecordId,
        chain: Vec<RecordId>,
    },

    #[error("reference depth limit {limit} exceeded at record {record_id}")]
    DepthLimitExceeded { record_id: RecordId, limit: usize },

    #[error("fetch failed for record {record_id} attribute {attribute}: {source}")]
    FetchFailure {
        record_id: RecordId,
        attribute: String,
        #[source]
        source: SourceError,
    },

    #[error("record {record_id} attribute {attribute} references missing record {referenced}")]
    DanglingReference {
        record_id: RecordId,
        attribute: String,
        referenced: RecordId,
    },

    #[error("record {record_id} attribute {attribute}: value {value} is not a record reference")]
    InvalidReference {
        record_id: RecordId,
        attribute: String,
        value: String,
    },

    #[error("record {record_id} attribute {attribute} references missing module {module_id}")]
    MissingModule {
        record_id: RecordId,
        attribute: String,
        module_id: ModuleId,
    },

    #[error("no attribute definitions for attribute set {0}")]
    UnknownAttributeSet(AttributeSetId),

    #[error("record {0} not found")]
    RecordNotFound(RecordId),

    #[error("resolution task failed: {0}")]
    TaskFailed(String),
}

impl ResolveError {
    /// Short kind label used in the exception log and the `$unresolved` marker
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::UnknownAttributeType { .. } => "UnknownAttributeType",
            ResolveError::MultipleValueRows { .. } => "MultipleValueRows",
            ResolveError::CyclicReference { .. } => "CyclicReference",
            ResolveError::DepthLimitExceeded { .. } => "DepthLimitExceeded",
            ResolveError::FetchFailure { .. } => "FetchFailure",
            ResolveError::DanglingReference { .. } => "DanglingReference",
            ResolveError::InvalidReference { .. } => "InvalidReference",
            ResolveError::MissingModule { .. } => "MissingModule",
            ResolveError::UnknownAttributeSet(_) => "UnknownAttributeSet",
            ResolveError::RecordNotFound(_) => "RecordNotFound",
            ResolveError::TaskFailed(_) => "TaskFailed",
        }
    }

    /// Errors that abort the resolution of the whole top-level record
    pub fn is_fatal_for_record(&self) -> bool {
        matches!(
            self,
            ResolveError::CyclicReference { .. }
                | ResolveError::DepthLimitExceeded { .. }
                | ResolveError::RecordNotFound(_)
        )
    }
}

/// API boundary error
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Source error: {0}")]
    SourceError(#[from] SourceError),

    #[error("Tree error: {0}")]
    TreeError(#[from] TreeError),

    #[error("Resolve error: {0}")]
    ResolveError(#[from] ResolveError),

    #[error("Index error: {0}")]
    IndexError(#[from] IndexError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
