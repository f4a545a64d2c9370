//! Name-based duplicate detection.
//!
//! Titles are compared after lower-casing and collapsing whitespace; nothing
//! else about a task is considered, and there is no fuzzy matching.

use std::collections::HashSet;

use crate::types::TaskRecord;

/// Canonical form used for title comparison.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalized titles present in the target to-do list.
#[derive(Debug, Clone, Default)]
pub struct ExistingTaskIndex {
    titles: HashSet<String>,
}

impl ExistingTaskIndex {
    pub fn from_titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            titles: titles
                .into_iter()
                .map(|t| normalize_title(t.as_ref()))
                .collect(),
        }
    }

    pub fn contains(&self, title: &str) -> bool {
        self.titles.contains(&normalize_title(title))
    }

    pub fn insert(&mut self, title: &str) {
        self.titles.insert(normalize_title(title));
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

/// Duplicate check for one run. `Disabled` treats every record as new.
#[derive(Debug, Clone)]
pub enum DuplicateFilter {
    Disabled,
    Enabled(ExistingTaskIndex),
}

impl DuplicateFilter {
    pub fn is_duplicate(&self, record: &TaskRecord) -> bool {
        match self {
            DuplicateFilter::Disabled => false,
            DuplicateFilter::Enabled(index) => index.contains(&record.content),
        }
    }

    /// Remember a title created during this run so a repeat in the same
    /// input is caught.
    pub fn record_created(&mut self, record: &TaskRecord) {
        if let DuplicateFilter::Enabled(index) = self {
            index.insert(&record.content);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize_title("  Fix \t  BUG\n"), "fix bug");
    }

    #[test]
    fn match_is_exact_after_normalization() {
        let filter = DuplicateFilter::Enabled(ExistingTaskIndex::from_titles(["Fix bug"]));
        assert!(filter.is_duplicate(&TaskRecord::new("  fix BUG  ")));
        assert!(!filter.is_duplicate(&TaskRecord::new("Fix bug!")));
        assert!(!filter.is_duplicate(&TaskRecord::new("Fix bugs")));
    }

    #[test]
    fn metadata_does_not_affect_matching() {
        let filter = DuplicateFilter::Enabled(ExistingTaskIndex::from_titles(["Release"]));
        let mut record = TaskRecord::new("release");
        record.due_on = NaiveDate::from_ymd_opt(2030, 1, 1);
        record.assignee_ids.insert(42);
        assert!(filter.is_duplicate(&record));
    }

    #[test]
    fn disabled_filter_never_matches_or_learns() {
        let mut filter = DuplicateFilter::Disabled;
        let record = TaskRecord::new("Anything");
        filter.record_created(&record);
        assert!(!filter.is_duplicate(&record));
    }

    #[test]
    fn created_titles_are_remembered() {
        let mut filter = DuplicateFilter::Enabled(ExistingTaskIndex::default());
        let record = TaskRecord::new("Add tests");
        assert!(!filter.is_duplicate(&record));
        filter.record_created(&record);
        assert!(filter.is_duplicate(&TaskRecord::new("add  tests")));
    }
}
