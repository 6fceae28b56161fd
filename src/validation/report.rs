//! Validation report formatting.
//!
//! Issues are grouped under the model section they belong to (`collections`,
//! `singles`, `menu`, ...). Issues on the top-level document fall under
//! `model`.

use std::collections::BTreeMap;

use super::{ValidationIssue, ValidationResult, ValidationSeverity};

const ROOT_SECTION: &str = "model";

/// Formats a validation result into a human-readable report.
pub fn format_report(result: &ValidationResult) -> String {
    let sections = group_by_section(result);
    if sections.is_empty() {
        return "Model is valid.".to_string();
    }

    let error_count = result.error_count();
    let warning_count = result.warnings().count();

    let title = if error_count > 0 {
        "Model Validation Failed"
    } else {
        "Model Validation Passed With Warnings"
    };
    let mut report = format!("\n{}\n{}\n", title, "=".repeat(title.len()));

    for (section, issues) in &sections {
        report.push_str(&format!("\n[{}]\n", section));
        for issue in issues {
            report.push_str(&format_issue(issue));
        }
    }

    report.push_str(&format!(
        "\n{} error(s), {} warning(s) in {} section(s)\n",
        error_count,
        warning_count,
        sections.len()
    ));
    if error_count > 0 {
        report.push_str("Model rejected.\n");
    }
    report
}

/// Sorts issues into sections, errors first, then by path within a severity.
fn group_by_section(result: &ValidationResult) -> BTreeMap<&str, Vec<&ValidationIssue>> {
    let mut sections: BTreeMap<&str, Vec<&ValidationIssue>> = BTreeMap::new();
    for issue in result.errors().chain(result.warnings()) {
        sections.entry(section_of(&issue.path)).or_default().push(issue);
    }
    for issues in sections.values_mut() {
        // Stable, so issues on one path keep the order they were found in.
        issues.sort_by(|a, b| {
            severity_rank(a.severity)
                .cmp(&severity_rank(b.severity))
                .then_with(|| a.path.cmp(&b.path))
        });
    }
    sections
}

/// First segment of an issue path: `collections[2].fields[0]` is in `collections`.
fn section_of(path: &str) -> &str {
    let head = path
        .trim_start_matches(['.', '/'])
        .split(['[', '.', '/'])
        .next()
        .unwrap_or_default();
    if head.is_empty() {
        ROOT_SECTION
    } else {
        head
    }
}

fn severity_rank(severity: ValidationSeverity) -> u8 {
    match severity {
        ValidationSeverity::Error => 0,
        ValidationSeverity::Warning => 1,
    }
}

fn format_issue(issue: &ValidationIssue) -> String {
    let label = match issue.severity {
        ValidationSeverity::Error => "error",
        ValidationSeverity::Warning => "warn ",
    };
    let location = if issue.path.is_empty() {
        "(root)"
    } else {
        issue.path.as_str()
    };

    let mut output = format!("  {} {}: {}\n", label, location, issue.message);
    if let Some(suggestion) = &issue.suggestion {
        output.push_str(&format!("        hint: {}\n", suggestion));
    }
    output
}

/// Formats a brief one-line summary.
pub fn format_brief_summary(result: &ValidationResult) -> String {
    let error_count = result.error_count();
    let warning_count = result.warnings().count();

    match (error_count, warning_count) {
        (0, 0) => "Model valid".to_string(),
        (0, warnings) => format!("Model valid with {} warning(s)", warnings),
        (errors, warnings) => format!(
            "Model invalid: {} error(s), {} warning(s)",
            errors, warnings
        ),
    }
}
