//! Attribute type dispatch
//!
//! Maps an attribute's type tag to one of a closed set of resolution
//! strategies. The table is built once per resolver; unknown tags are not an
//! entry but a `None` lookup, which the resolver turns into
//! `UnknownAttributeType`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Caption column used by file-like attachments
pub const DEFAULT_CAPTION_COLUMN: &str = "description";

/// Delimiter used by list-of-references attributes
pub const DEFAULT_DELIMITER: char = ',';

/// Strategy names as they appear in configuration (`resolver.type_map`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Direct,
    OrderedAttachment,
    ModuleReference,
    SingleReference,
    CollectionReference,
    DelimitedListReference,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Direct => "direct",
            StrategyKind::OrderedAttachment => "ordered_attachment",
            StrategyKind::ModuleReference => "module_reference",
            StrategyKind::SingleReference => "single_reference",
            StrategyKind::CollectionReference => "collection_reference",
            StrategyKind::DelimitedListReference => "delimited_list_reference",
        }
    }

    /// Parse a canonical strategy name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "direct" => Some(StrategyKind::Direct),
            "ordered_attachment" => Some(StrategyKind::OrderedAttachment),
            "module_reference" => Some(StrategyKind::ModuleReference),
            "single_reference" => Some(StrategyKind::SingleReference),
            "collection_reference" => Some(StrategyKind::CollectionReference),
            "delimited_list_reference" => Some(StrategyKind::DelimitedListReference),
            _ => None,
        }
    }

    /// Strategy with default parameters
    pub fn strategy(&self) -> TypeStrategy {
        match self {
            StrategyKind::Direct => TypeStrategy::Direct,
            StrategyKind::OrderedAttachment => TypeStrategy::OrderedAttachment {
                caption: DEFAULT_CAPTION_COLUMN.to_string(),
            },
            StrategyKind::ModuleReference => TypeStrategy::ModuleReference,
            StrategyKind::SingleReference => TypeStrategy::SingleReference,
            StrategyKind::CollectionReference => TypeStrategy::CollectionReference,
            StrategyKind::DelimitedListReference => TypeStrategy::DelimitedListReference {
                delimiter: DEFAULT_DELIMITER,
            },
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the value rows of one attribute become a resolved value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeStrategy {
    /// At most one row; its raw value
    Direct,
    /// Rows sorted by `sort`, each kept as `{value, caption}`
    OrderedAttachment { caption: String },
    /// Each row is a module id
    ModuleReference,
    /// Row value is one record id
    SingleReference,
    /// Every row is one record id, in retrieval order
    CollectionReference,
    /// Single row holding delimiter-joined record ids
    DelimitedListReference { delimiter: char },
}

impl TypeStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            TypeStrategy::Direct => StrategyKind::Direct,
            TypeStrategy::OrderedAttachment { .. } => StrategyKind::OrderedAttachment,
            TypeStrategy::ModuleReference => StrategyKind::ModuleReference,
            TypeStrategy::SingleReference => StrategyKind::SingleReference,
            TypeStrategy::CollectionReference => StrategyKind::CollectionReference,
            TypeStrategy::DelimitedListReference { .. } => StrategyKind::DelimitedListReference,
        }
    }

    /// True when resolving may recurse into other records
    pub fn follows_references(&self) -> bool {
        matches!(
            self,
            TypeStrategy::SingleReference
                | TypeStrategy::CollectionReference
                | TypeStrategy::DelimitedListReference { .. }
        )
    }

    /// Apply per-attribute overrides from the definition's type config
    /// (`caption_column`, `delimiter`).
    pub fn configured(&self, type_config: &Map<String, Value>) -> TypeStrategy {
        match self {
            TypeStrategy::OrderedAttachment { caption } => TypeStrategy::OrderedAttachment {
                caption: type_config
                    .get("caption_column")
                    .and_then(Value::as_str)
                    .unwrap_or(caption)
                    .to_string(),
            },
            TypeStrategy::DelimitedListReference { delimiter } => {
                TypeStrategy::DelimitedListReference {
                    delimiter: type_config
                        .get("delimiter")
                        .and_then(Value::as_str)
                        .and_then(|s| s.chars().next())
                        .unwrap_or(*delimiter),
                }
            }
            other => other.clone(),
        }
    }
}

const DIRECT_TAGS: &[&str] = &[
    "FieldtypeText",
    "FieldtypeTextarea",
    "FieldtypeTextareaLanguage",
    "FieldtypeTextLanguage",
    "FieldtypePageTitle",
    "FieldtypePageTitleLanguage",
    "FieldtypeInteger",
    "FieldtypeFloat",
    "FieldtypeDecimal",
    "FieldtypeEmail",
    "FieldtypeURL",
    "FieldtypeCheckbox",
    "FieldtypeDatetime",
    "FieldtypePassword",
    "FieldtypeToggle",
    "FieldtypeOptions",
    "FieldtypeSelector",
    "FieldtypeFieldsetOpen",
    "FieldtypeFieldsetClose",
    "FieldtypeFieldsetTabOpen",
    "FieldtypeComments",
];

/// Static type tag → strategy table
#[derive(Debug, Clone)]
pub struct StrategyTable {
    entries: HashMap<String, TypeStrategy>,
}

impl Default for StrategyTable {
    fn default() -> Self {
        let mut entries: HashMap<String, TypeStrategy> = DIRECT_TAGS
            .iter()
            .map(|tag| (tag.to_string(), TypeStrategy::Direct))
            .collect();

        for tag in ["FieldtypeFile", "FieldtypeImage"] {
            entries.insert(tag.to_string(), StrategyKind::OrderedAttachment.strategy());
        }
        entries.insert(
            "FieldtypePadNotes".to_string(),
            TypeStrategy::OrderedAttachment {
                caption: "notes".to_string(),
            },
        );
        entries.insert("FieldtypeModule".to_string(), TypeStrategy::ModuleReference);
        entries.insert("FieldtypePage".to_string(), TypeStrategy::SingleReference);
        entries.insert("FieldtypePageTable".to_string(), TypeStrategy::CollectionReference);
        entries.insert(
            "FieldtypeRepeater".to_string(),
            StrategyKind::DelimitedListReference.strategy(),
        );

        StrategyTable { entries }
    }
}

impl StrategyTable {
    /// Default table plus extra tag → strategy entries
    pub fn with_extra(extra: &HashMap<String, StrategyKind>) -> Self {
        let mut table = Self::default();
        for (tag, kind) in extra {
            table.entries.insert(tag.clone(), kind.strategy());
        }
        table
    }

    /// Strategy for a type tag; canonical strategy names are accepted too.
    /// Falls back to a case-insensitive match, since layered config may
    /// lowercase `type_map` keys.
    pub fn lookup(&self, type_tag: &str) -> Option<TypeStrategy> {
        self.entries
            .get(type_tag)
            .cloned()
            .or_else(|| StrategyKind::parse(type_tag).map(|kind| kind.strategy()))
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|(tag, _)| tag.eq_ignore_ascii_case(type_tag))
                    .map(|(_, strategy)| strategy.clone())
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
