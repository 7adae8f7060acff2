//! Reconciliation report data
//!
//! Plain data produced by a run: which paths exist on one side only, which
//! paired records are equal or differ, and every failure that was contained
//! along the way, plus the store-wide definition comparisons. Rendering
//! lives in `crate::report`.

use super::definitions::DefinitionComparison;
use crate::diff::Difference;
use crate::error::{ResolveError, TreeError};
use crate::types::{RecordId, Side};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One paired record whose documents differ
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathDifference {
    pub path: String,
    pub difference: Difference,
}

/// A top-level record whose resolution failed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionFailure {
    pub side: Side,
    pub path: String,
    pub record_id: RecordId,
    pub kind: String,
    pub message: String,
}

impl ResolutionFailure {
    pub fn new(side: Side, path: &str, record_id: RecordId, err: &ResolveError) -> Self {
        ResolutionFailure {
            side,
            path: path.to_string(),
            record_id,
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// A store whose tree could not be built; pairing was skipped
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeFailure {
    pub side: Side,
    pub label: String,
    /// `MalformedTree` or `Unreachable`
    pub kind: String,
    pub message: String,
}

impl TreeFailure {
    pub fn new(side: Side, label: &str, err: &TreeError) -> Self {
        TreeFailure {
            side,
            label: label.to_string(),
            kind: tree_error_kind(err).to_string(),
            message: err.to_string(),
        }
    }
}

/// Exception log kind for a tree error
pub fn tree_error_kind(err: &TreeError) -> &'static str {
    if err.is_malformed() {
        "MalformedTree"
    } else {
        "Unreachable"
    }
}

/// Bucket sizes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub source_only: usize,
    pub target_only: usize,
    pub equal: usize,
    pub unequal: usize,
    pub resolution_failures: usize,
    pub tree_errors: usize,
    /// Modules, attributes and templates that are one-sided or differ
    pub module_mismatches: usize,
    pub attribute_mismatches: usize,
    pub template_mismatches: usize,
}

/// Result of one reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub source_label: String,
    pub target_label: String,
    pub generated_at: DateTime<Utc>,
    /// Paths only in the source, source traversal order
    pub source_only: Vec<String>,
    /// Paths only in the target, target traversal order
    pub target_only: Vec<String>,
    pub equal: Vec<String>,
    pub unequal: Vec<PathDifference>,
    pub resolution_failures: Vec<ResolutionFailure>,
    pub tree_errors: Vec<TreeFailure>,
    /// Module table keyed by class
    pub modules: DefinitionComparison,
    /// Attribute definitions keyed by attribute name
    pub attributes: DefinitionComparison,
    /// Templates keyed by name, with their field lists
    pub templates: DefinitionComparison,
    /// Contained errors written to the exception log during the run
    pub exception_count: usize,
}

impl ReconciliationReport {
    pub fn new(source_label: impl Into<String>, target_label: impl Into<String>) -> Self {
        ReconciliationReport {
            source_label: source_label.into(),
            target_label: target_label.into(),
            generated_at: Utc::now(),
            source_only: Vec::new(),
            target_only: Vec::new(),
            equal: Vec::new(),
            unequal: Vec::new(),
            resolution_failures: Vec::new(),
            tree_errors: Vec::new(),
            modules: DefinitionComparison::default(),
            attributes: DefinitionComparison::default(),
            templates: DefinitionComparison::default(),
            exception_count: 0,
        }
    }

    pub fn counts(&self) -> ReportCounts {
        ReportCounts {
            source_only: self.source_only.len(),
            target_only: self.target_only.len(),
            equal: self.equal.len(),
            unequal: self.unequal.len(),
            resolution_failures: self.resolution_failures.len(),
            tree_errors: self.tree_errors.len(),
            module_mismatches: self.modules.mismatch_count(),
            attribute_mismatches: self.attributes.mismatch_count(),
            template_mismatches: self.templates.mismatch_count(),
        }
    }

    /// Difference recorded for a path
    pub fn difference_at(&self, path: &str) -> Option<&Difference> {
        self.unequal
            .iter()
            .find(|d| d.path == path)
            .map(|d| &d.difference)
    }

    /// Definition comparisons with their report labels
    pub fn definitions(&self) -> [(&'static str, &DefinitionComparison); 3] {
        [
            ("module", &self.modules),
            ("attribute", &self.attributes),
            ("template", &self.templates),
        ]
    }

    /// True when both trees were built, every path pairs up equal and the
    /// store-wide definitions match
    pub fn is_clean(&self) -> bool {
        self.source_only.is_empty()
            && self.target_only.is_empty()
            && self.unequal.is_empty()
            && self.resolution_failures.is_empty()
            && self.tree_errors.is_empty()
            && self.definitions().iter().all(|(_, c)| c.is_clean())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_counts_and_lookup() {
        let mut report = ReconciliationReport::new("source", "target");
        assert!(report.is_clean());

        report.equal.push("/".to_string());
        report.unequal.push(PathDifference {
            path: "/a".to_string(),
            difference: Difference::leaf(json!("Hello"), json!("Hello!")),
        });
        report.tree_errors.push(TreeFailure::new(
            Side::Target,
            "target",
            &TreeError::Unreachable { ids: vec![3] },
        ));

        let counts = report.counts();
        assert_eq!(counts.equal, 1);
        assert_eq!(counts.unequal, 1);
        assert_eq!(counts.tree_errors, 1);
        assert!(report.difference_at("/a").is_some());
        assert!(report.difference_at("/b").is_none());
        assert!(!report.is_clean());
        assert_eq!(report.tree_errors[0].kind, "Unreachable");
    }

    #[test]
    fn test_definition_mismatch_is_not_clean() {
        let mut report = ReconciliationReport::new("source", "target");
        report.templates.target_only.push("blog-post".to_string());
        report.modules.equal.push("ProcessPageEdit".to_string());

        assert!(!report.is_clean());
        let counts = report.counts();
        assert_eq!(counts.template_mismatches, 1);
        assert_eq!(counts.module_mismatches, 0);
        assert_eq!(counts.equal, 0);
    }

    #[test]
    fn test_serializes_sides_lowercase() {
        let failure = ResolutionFailure::new(
            Side::Source,
            "/loop",
            4,
            &ResolveError::CyclicReference {
                record_id: 4,
                chain: vec![4, 5],
            },
        );
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["side"], json!("source"));
        assert_eq!(value["kind"], json!("CyclicReference"));
    }
}
