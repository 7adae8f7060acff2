//! Record Store
//!
//! Raw rows as delivered by the row-acquisition collaborator, and the
//! `RowSource` port the engine pulls them through. Rows are immutable once
//! loaded; everything derived from them (paths, resolved values) lives in the
//! component that computed it.

pub mod snapshot;

use crate::error::{ApiError, SourceError};
use crate::keyed_index::{KeyFields, KeyedIndex};
use crate::types::{AttributeId, AttributeSetId, ModuleId, RecordId, ROOT_PARENT_SENTINEL};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

pub use snapshot::{Snapshot, SnapshotSource};

/// Key field used to group attribute definitions
pub const ATTRIBUTE_SET_KEY: &str = "attribute_set_id";

/// One entity in a store (a page)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(default, alias = "parentId")]
    pub parent_id: Option<RecordId>,
    #[serde(alias = "attributeSetId")]
    pub attribute_set_id: AttributeSetId,
    pub name: String,
    /// Human-readable label of the attribute set (template name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Free-form scalar columns (status, sort, ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl Record {
    pub fn new(id: RecordId, parent_id: Option<RecordId>, name: impl Into<String>) -> Self {
        Record {
            id,
            parent_id,
            attribute_set_id: 0,
            name: name.into(),
            template: None,
            attributes: Map::new(),
        }
    }

    pub fn with_attribute_set(mut self, attribute_set_id: AttributeSetId) -> Self {
        self.attribute_set_id = attribute_set_id;
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Parent id, treating the sentinel as "no parent"
    pub fn parent(&self) -> Option<RecordId> {
        self.parent_id.filter(|id| *id != ROOT_PARENT_SENTINEL)
    }
}

/// Describes one attribute applicable to every record of an attribute set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    #[serde(alias = "attributeSetId")]
    pub attribute_set_id: AttributeSetId,
    #[serde(alias = "attributeId")]
    pub attribute_id: AttributeId,
    #[serde(alias = "attributeName")]
    pub attribute_name: String,
    #[serde(alias = "typeTag")]
    pub type_tag: String,
    #[serde(default)]
    pub ordinal: i64,
    #[serde(default, alias = "typeConfig", skip_serializing_if = "Map::is_empty")]
    pub type_config: Map<String, Value>,
}

impl AttributeDefinition {
    pub fn new(
        attribute_set_id: AttributeSetId,
        attribute_id: AttributeId,
        attribute_name: impl Into<String>,
        type_tag: impl Into<String>,
        ordinal: i64,
    ) -> Self {
        AttributeDefinition {
            attribute_set_id,
            attribute_id,
            attribute_name: attribute_name.into(),
            type_tag: type_tag.into(),
            ordinal,
            type_config: Map::new(),
        }
    }
}

impl KeyFields for AttributeDefinition {
    fn key_value(&self, field: &str) -> Option<String> {
        match field {
            "attribute_set_id" => Some(self.attribute_set_id.to_string()),
            "attribute_id" => Some(self.attribute_id.to_string()),
            "attribute_name" => Some(self.attribute_name.clone()),
            "type_tag" => Some(self.type_tag.clone()),
            "ordinal" => Some(self.ordinal.to_string()),
            _ => None,
        }
    }
}

/// One stored value row for (record, attribute)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRow {
    #[serde(alias = "data")]
    pub value: Value,
    /// Sort key used by ordered-attachment attributes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<i64>,
    /// Remaining columns (caption-like fields, timestamps)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ValueRow {
    pub fn new(value: impl Into<Value>) -> Self {
        ValueRow {
            value: value.into(),
            sort: None,
            extra: Map::new(),
        }
    }

    pub fn with_sort(mut self, sort: i64) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_column(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}

/// Entry of the module table referenced by module-typed attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub id: ModuleId,
    pub class: String,
    #[serde(default)]
    pub flags: i64,
    #[serde(default)]
    pub data: Value,
}

impl ModuleDefinition {
    /// Full definition as compared across stores; the store-local id is left out
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "class": self.class,
            "flags": self.flags,
            "data": self.data,
        })
    }
}

/// Source of raw rows for one store.
///
/// Implementations must be shareable across concurrent resolution tasks.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Short label used in logs ("source", "target", a file name)
    fn label(&self) -> &str;

    /// All records with their parent and attribute-set linkage
    async fn fetch_records(&self) -> Result<Vec<Record>, SourceError>;

    /// All attribute definitions, ordered by attribute set then ordinal
    async fn fetch_attribute_definitions(&self) -> Result<Vec<AttributeDefinition>, SourceError>;

    /// All value rows for one record and attribute; zero or more rows
    async fn fetch_value_rows(
        &self,
        record_id: RecordId,
        attribute_name: &str,
    ) -> Result<Vec<ValueRow>, SourceError>;

    /// The module table
    async fn fetch_modules(&self) -> Result<Vec<ModuleDefinition>, SourceError>;
}

/// Read-only data for one store, shared by every resolution task of a pass
#[derive(Debug)]
pub struct StoreData {
    records: Vec<Record>,
    positions: HashMap<RecordId, usize>,
    definitions: KeyedIndex<AttributeDefinition>,
    modules: HashMap<ModuleId, ModuleDefinition>,
}

impl StoreData {
    /// Pull records, attribute definitions and modules from a row source
    pub async fn load(source: &dyn RowSource) -> Result<Self, ApiError> {
        let (records, definitions, modules) = futures::try_join!(
            source.fetch_records(),
            source.fetch_attribute_definitions(),
            source.fetch_modules(),
        )?;
        debug!(
            store = source.label(),
            records = records.len(),
            definitions = definitions.len(),
            modules = modules.len(),
            "Loaded store rows"
        );
        Ok(Self::from_parts(records, definitions, modules)?)
    }

    /// Build from already-fetched rows.
    ///
    /// Definitions are stably sorted by (attribute set, ordinal). A repeated
    /// attribute name within one set keeps the first definition.
    pub fn from_parts(
        records: Vec<Record>,
        mut definitions: Vec<AttributeDefinition>,
        modules: Vec<ModuleDefinition>,
    ) -> Result<Self, crate::error::IndexError> {
        definitions.sort_by_key(|d| (d.attribute_set_id, d.ordinal));

        let mut seen: HashSet<(AttributeSetId, String)> = HashSet::new();
        definitions.retain(|d| {
            let fresh = seen.insert((d.attribute_set_id, d.attribute_name.clone()));
            if !fresh {
                warn!(
                    attribute_set_id = d.attribute_set_id,
                    attribute = %d.attribute_name,
                    "Duplicate attribute name in attribute set, keeping first definition"
                );
            }
            fresh
        });

        let positions = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id, i))
            .collect();

        Ok(StoreData {
            records,
            positions,
            definitions: KeyedIndex::with_records([ATTRIBUTE_SET_KEY], definitions)?,
            modules: modules.into_iter().map(|m| (m.id, m)).collect(),
        })
    }

    /// Records in load order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.positions.get(&id).map(|&i| &self.records[i])
    }

    /// Attribute definitions for an attribute set, in ordinal order
    pub fn attributes_for(&self, attribute_set_id: AttributeSetId) -> &[AttributeDefinition] {
        self.definitions.records(&[attribute_set_id.to_string()])
    }

    pub fn definitions(&self) -> &KeyedIndex<AttributeDefinition> {
        &self.definitions
    }

    pub fn module(&self, id: ModuleId) -> Option<&ModuleDefinition> {
        self.modules.get(&id)
    }

    /// Module table ordered by id
    pub fn modules(&self) -> Vec<&ModuleDefinition> {
        let mut modules: Vec<&ModuleDefinition> = self.modules.values().collect();
        modules.sort_by_key(|m| m.id);
        modules
    }
}
