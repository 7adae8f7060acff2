//! Format a reconciliation report as text or JSON.
//!
//! Rendering never changes the computed report: `exclude_prefixes` and
//! `show_equal` only decide what is printed.

use crate::config::ReportConfig;
use crate::diff::{Difference, LeafDifference};
use crate::error::ApiError;
use crate::reconcile::ReconciliationReport;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::Value;

/// Longest value shown in a difference cell
const MAX_VALUE_WIDTH: usize = 60;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// True when `path` lies strictly below one of the prefixes
pub fn is_excluded(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| {
        let prefix = prefix.trim_end_matches('/');
        path.len() > prefix.len() + 1
            && path.starts_with(prefix)
            && path.as_bytes()[prefix.len()] == b'/'
    })
}

/// Copy of the report without excluded paths
pub fn visible_report(report: &ReconciliationReport, config: &ReportConfig) -> ReconciliationReport {
    let prefixes = &config.exclude_prefixes;
    let keep = |path: &str| !is_excluded(path, prefixes);

    let mut visible = report.clone();
    visible.source_only.retain(|p| keep(p));
    visible.target_only.retain(|p| keep(p));
    visible.equal.retain(|p| keep(p));
    visible.unequal.retain(|d| keep(&d.path));
    visible.resolution_failures.retain(|f| keep(&f.path));
    visible
}

/// Leaf differences under dotted field paths, in difference order
pub fn flatten_difference(difference: &Difference) -> Vec<(String, &LeafDifference)> {
    fn walk<'a>(difference: &'a Difference, prefix: String, out: &mut Vec<(String, &'a LeafDifference)>) {
        match difference {
            Difference::Leaf(leaf) => out.push((prefix, leaf)),
            Difference::Nested(node) => {
                for (key, child) in node.iter() {
                    let field = if prefix.is_empty() {
                        key.to_string()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    walk(child, field, out);
                }
            }
        }
    }

    let mut out = Vec::new();
    walk(difference, String::new(), &mut out);
    out
}

fn display_value(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    };
    if text.chars().count() > MAX_VALUE_WIDTH {
        let truncated: String = text.chars().take(MAX_VALUE_WIDTH - 3).collect();
        format!("{}...", truncated)
    } else {
        text
    }
}

fn path_table(paths: &[String]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Path"]);
    for path in paths {
        table.add_row(vec![path.clone()]);
    }
    table
}

/// One row per one-sided definition and per differing definition field
fn definition_table(report: &ReconciliationReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "Kind".to_string(),
        "Name".to_string(),
        "Field".to_string(),
        report.source_label.clone(),
        report.target_label.clone(),
    ]);
    for (kind, comparison) in report.definitions() {
        for key in &comparison.source_only {
            table.add_row(vec![
                kind.to_string(),
                key.clone(),
                String::new(),
                "present".to_string(),
                "-".to_string(),
            ]);
        }
        for key in &comparison.target_only {
            table.add_row(vec![
                kind.to_string(),
                key.clone(),
                String::new(),
                "-".to_string(),
                "present".to_string(),
            ]);
        }
        for entry in &comparison.unequal {
            for (field, leaf) in flatten_difference(&entry.difference) {
                table.add_row(vec![
                    kind.to_string(),
                    entry.key.clone(),
                    field,
                    display_value(&leaf.source_value),
                    display_value(&leaf.target_value),
                ]);
            }
        }
    }
    table
}

/// Format a report as human-readable text.
pub fn format_report_text(report: &ReconciliationReport, config: &ReportConfig) -> String {
    let visible = visible_report(report, config);
    let counts = report.counts();
    let mut out = String::new();

    out.push_str(&format!(
        "{}\n\n",
        format_section_heading(&format!(
            "Reconciliation: {} vs {}",
            report.source_label, report.target_label
        ))
    ));

    let mut summary = Table::new();
    summary.load_preset(UTF8_BORDERS_ONLY);
    summary.set_header(vec!["Bucket", "Records"]);
    summary.add_row(vec![format!("only in {}", report.source_label), counts.source_only.to_string()]);
    summary.add_row(vec![format!("only in {}", report.target_label), counts.target_only.to_string()]);
    summary.add_row(vec!["equal".to_string(), counts.equal.to_string()]);
    summary.add_row(vec!["unequal".to_string(), counts.unequal.to_string()]);
    summary.add_row(vec![
        "resolution failures".to_string(),
        counts.resolution_failures.to_string(),
    ]);
    out.push_str(&format!("{}\n\n", summary));

    if report.definitions().iter().any(|(_, c)| !c.is_clean()) {
        out.push_str(&format!("{}\n\n", format_section_heading("Definitions")));
        out.push_str(&format!("{}\n\n", definition_table(report)));
    }

    if !report.tree_errors.is_empty() {
        out.push_str(&format!("{}\n\n", format_section_heading("Tree errors")));
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Store", "Kind", "Message"]);
        for failure in &report.tree_errors {
            table.add_row(vec![
                failure.label.clone(),
                failure.kind.clone(),
                failure.message.clone(),
            ]);
        }
        out.push_str(&format!("{}\n", table));
        out.push_str(&format!(
            "{}\n\n",
            "Records were not paired because a tree could not be built.".red()
        ));
    }

    if !visible.source_only.is_empty() {
        out.push_str(&format!(
            "{}\n\n",
            format_section_heading(&format!("Only in {}", report.source_label))
        ));
        out.push_str(&format!("{}\n\n", path_table(&visible.source_only)));
    }

    if !visible.target_only.is_empty() {
        out.push_str(&format!(
            "{}\n\n",
            format_section_heading(&format!("Only in {}", report.target_label))
        ));
        out.push_str(&format!("{}\n\n", path_table(&visible.target_only)));
    }

    if !visible.unequal.is_empty() {
        out.push_str(&format!("{}\n\n", format_section_heading("Differences")));
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec![
            "Path".to_string(),
            "Field".to_string(),
            report.source_label.clone(),
            report.target_label.clone(),
        ]);
        for entry in &visible.unequal {
            for (field, leaf) in flatten_difference(&entry.difference) {
                table.add_row(vec![
                    entry.path.clone(),
                    field,
                    display_value(&leaf.source_value),
                    display_value(&leaf.target_value),
                ]);
            }
        }
        out.push_str(&format!("{}\n\n", table));
    }

    if config.show_equal && !visible.equal.is_empty() {
        out.push_str(&format!("{}\n\n", format_section_heading("Equal")));
        out.push_str(&format!("{}\n\n", path_table(&visible.equal)));
    }

    if !visible.resolution_failures.is_empty() {
        out.push_str(&format!("{}\n\n", format_section_heading("Resolution failures")));
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Store", "Path", "Kind", "Message"]);
        for failure in &visible.resolution_failures {
            table.add_row(vec![
                failure.side.to_string(),
                failure.path.clone(),
                failure.kind.clone(),
                failure.message.clone(),
            ]);
        }
        out.push_str(&format!("{}\n\n", table));
    }

    if report.is_clean() {
        out.push_str(&format!("{}\n", "Stores are equivalent.".green()));
    }
    if report.exception_count > 0 {
        out.push_str(&format!(
            "{} contained errors written to the exception log.\n",
            report.exception_count.yellow()
        ));
    }
    out
}

/// Format a report as pretty JSON
pub fn format_report_json(report: &ReconciliationReport, config: &ReportConfig) -> Result<String, ApiError> {
    let visible = visible_report(report, config);
    let mut value = serde_json::to_value(&visible)?;
    if let Value::Object(map) = &mut value {
        map.insert("counts".to_string(), serde_json::to_value(report.counts())?);
    }
    Ok(serde_json::to_string_pretty(&value)?)
}
