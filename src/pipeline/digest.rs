//! Notification text for one run.

use std::path::PathBuf;

use crate::error::AppError;
use crate::models::{LineageKey, Record};
use crate::pipeline::ChangeSet;

/// Findings accumulated across all lineages of a run.
#[derive(Debug, Clone, Default)]
pub struct Digest {
    sections: Vec<(LineageKey, ChangeSet)>,
    attachments: Vec<PathBuf>,
}

impl Digest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the outcome of one lineage. Lineages without news add no text.
    pub fn add(&mut self, lineage: LineageKey, changes: ChangeSet) {
        if changes.has_changes() {
            self.sections.push((lineage, changes));
        }
    }

    pub fn attach(&mut self, path: PathBuf) {
        self.attachments.push(path);
    }

    pub fn has_new_items(&self) -> bool {
        !self.sections.is_empty()
    }

    /// Total new records over all lineages.
    pub fn new_item_count(&self) -> usize {
        self.sections.iter().map(|(_, c)| c.len()).sum()
    }

    pub fn attachments(&self) -> &[PathBuf] {
        &self.attachments
    }

    pub fn subject(&self, prefix: &str) -> String {
        format!("{prefix} Update - New Items Found")
    }

    pub fn body(&self) -> String {
        let mut lines = Vec::new();
        for (lineage, changes) in &self.sections {
            if changes.first_run {
                lines.push(format!(
                    "Found {} {} for {} (first run)",
                    changes.len(),
                    lineage.category,
                    lineage.filter_name
                ));
            } else {
                lines.push(format!(
                    "Found {} new {} for {}:",
                    changes.len(),
                    lineage.category,
                    lineage.filter_name
                ));
                lines.extend(
                    changes
                        .new_records
                        .iter()
                        .map(|r: &Record| format!("- {}", r.title())),
                );
            }
            lines.push(String::new());
        }
        lines.join("\n")
    }
}

pub fn failure_subject(prefix: &str) -> String {
    format!("{prefix} Error")
}

pub fn failure_body(prefix: &str, error: &AppError) -> String {
    format!("An error occurred while running the {prefix} job:\n\n{error}")
}

/// Body for lineages skipped under isolated failure handling.
pub fn skipped_lineages_body(prefix: &str, failures: &[(LineageKey, AppError)]) -> String {
    let mut body = format!(
        "{} search(es) failed while running the {prefix} job:\n",
        failures.len()
    );
    for (lineage, error) in failures {
        body.push_str(&format!("\n- {lineage}: {error}"));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn changes(first_run: bool, titles: &[&str]) -> ChangeSet {
        ChangeSet {
            first_run,
            new_records: titles
                .iter()
                .map(|t| Record::new(*t, "", "Active").unwrap())
                .collect(),
        }
    }

    #[test]
    fn test_body_lists_new_titles() {
        let mut digest = Digest::new();
        digest.add(
            LineageKey::new(Category::Tenders, "india_water"),
            changes(false, &["Z", "W"]),
        );
        digest.add(
            LineageKey::new(Category::Projects, "india_transport"),
            changes(true, &["A", "B", "C"]),
        );

        assert!(digest.has_new_items());
        assert_eq!(digest.new_item_count(), 5);
        assert_eq!(
            digest.body(),
            "Found 2 new tenders for india_water:\n- Z\n- W\n\n\
             Found 3 projects for india_transport (first run)\n"
        );
        assert_eq!(
            digest.subject("ADB Monitoring"),
            "ADB Monitoring Update - New Items Found"
        );
    }

    #[test]
    fn test_unchanged_lineages_add_nothing() {
        let mut digest = Digest::new();
        digest.add(
            LineageKey::new(Category::Tenders, "quiet"),
            changes(false, &[]),
        );
        digest.attach(PathBuf::from("output/tenders_quiet_20250101_090000.csv"));

        assert!(!digest.has_new_items());
        assert_eq!(digest.body(), "");
        assert_eq!(digest.attachments().len(), 1);
    }

    #[test]
    fn test_failure_text() {
        let err = AppError::source_fetch("tenders/x", "HTTP 503");
        assert_eq!(failure_subject("ADB Monitoring"), "ADB Monitoring Error");
        assert_eq!(
            failure_body("ADB Monitoring", &err),
            "An error occurred while running the ADB Monitoring job:\n\n\
             Source fetch failed for tenders/x: HTTP 503"
        );
    }

    #[test]
    fn test_skipped_lineages_text() {
        let failures = vec![(
            LineageKey::new(Category::Projects, "y"),
            AppError::source_fetch("projects/y", "timeout"),
        )];
        let body = skipped_lineages_body("ADB Monitoring", &failures);
        assert!(body.starts_with("1 search(es) failed"));
        assert!(body.ends_with("- projects/y: Source fetch failed for projects/y: timeout"));
    }
}
