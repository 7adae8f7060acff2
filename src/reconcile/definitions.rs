//! Store-wide definitions compared by name.
//!
//! Besides the record tree, each store carries a module table, attribute
//! definitions and templates. None of their ids carry across stores, so
//! modules pair by class, attributes by attribute name and templates by
//! template name.

use crate::diff::{Difference, StructuralDiffer};
use crate::store::StoreData;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Documents for one definition kind, keyed by name
pub type DefinitionDocuments = BTreeMap<String, Value>;

/// Keyed definitions of one store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreDefinitions {
    pub modules: DefinitionDocuments,
    pub attributes: DefinitionDocuments,
    pub templates: DefinitionDocuments,
}

fn keep_first(documents: &mut DefinitionDocuments, key: &str, document: Value) {
    if let Entry::Vacant(slot) = documents.entry(key.to_string()) {
        slot.insert(document);
    }
}

impl StoreDefinitions {
    /// Collect keyed documents from loaded store data.
    ///
    /// A repeated key keeps the first definition: lowest module id, first
    /// attribute set, first record using a template.
    pub fn collect(store: &StoreData) -> Self {
        let mut definitions = StoreDefinitions::default();

        for module in store.modules() {
            keep_first(&mut definitions.modules, &module.class, module.to_json());
        }

        for entry in store.definitions().entries() {
            for definition in entry.records {
                keep_first(
                    &mut definitions.attributes,
                    &definition.attribute_name,
                    json!({
                        "type": definition.type_tag,
                        "config": definition.type_config,
                    }),
                );
            }
        }

        for record in store.records() {
            let Some(template) = &record.template else {
                continue;
            };
            if definitions.templates.contains_key(template) {
                continue;
            }
            let fields: Vec<Value> = store
                .attributes_for(record.attribute_set_id)
                .iter()
                .map(|d| json!({"name": d.attribute_name, "type": d.type_tag}))
                .collect();
            definitions
                .templates
                .insert(template.clone(), json!({ "fields": fields }));
        }

        definitions
    }
}

/// One definition present on both sides whose documents differ
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefinitionDifference {
    pub key: String,
    pub difference: Difference,
}

/// Comparison of one definition kind across the two stores
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DefinitionComparison {
    pub source_only: Vec<String>,
    pub target_only: Vec<String>,
    pub equal: Vec<String>,
    pub unequal: Vec<DefinitionDifference>,
}

impl DefinitionComparison {
    /// Pair documents by key; every bucket comes out in key order
    pub fn compare(
        differ: &StructuralDiffer,
        source: &DefinitionDocuments,
        target: &DefinitionDocuments,
    ) -> Self {
        let mut comparison = DefinitionComparison::default();
        for (key, source_doc) in source {
            match target.get(key) {
                None => comparison.source_only.push(key.clone()),
                Some(target_doc) => match differ.diff(source_doc, target_doc) {
                    None => comparison.equal.push(key.clone()),
                    Some(difference) => comparison.unequal.push(DefinitionDifference {
                        key: key.clone(),
                        difference,
                    }),
                },
            }
        }
        comparison.target_only = target
            .keys()
            .filter(|key| !source.contains_key(*key))
            .cloned()
            .collect();
        comparison
    }

    /// Keys that are one-sided or differ
    pub fn mismatch_count(&self) -> usize {
        self.source_only.len() + self.target_only.len() + self.unequal.len()
    }

    pub fn is_clean(&self) -> bool {
        self.mismatch_count() == 0
    }

    pub fn difference_at(&self, key: &str) -> Option<&Difference> {
        self.unequal
            .iter()
            .find(|d| d.key == key)
            .map(|d| &d.difference)
    }
}
