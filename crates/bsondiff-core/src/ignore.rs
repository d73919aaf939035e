//! Field exclusion.

use serde::{Deserialize, Serialize};

use crate::path::PathBuilder;

/// How ignore entries are matched against fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IgnoreMode {
    /// An entry matches any field with that exact name, at any depth.
    #[default]
    #[serde(rename = "leaf", alias = "leaf_name")]
    LeafName,
    /// An entry matches only the field at that exact dotted path.
    #[serde(rename = "path", alias = "dotted_path")]
    DottedPath,
}

/// Exact-match membership test over a list of field names or paths.
///
/// No wildcards, no prefixes: `"name"` does not match `"names"`, and in
/// [`IgnoreMode::DottedPath`] mode `"a"` does not match `"a.b"` (though ignoring
/// `"a"` removes the whole subtree below it from the comparison).
#[derive(Clone, Debug, Default)]
pub struct IgnoreFilter {
    entries: Vec<String>,
    mode: IgnoreMode,
}

impl IgnoreFilter {
    pub fn new<S: AsRef<str>>(entries: &[S], mode: IgnoreMode) -> Self {
        Self {
            entries: entries.iter().map(|e| e.as_ref().to_string()).collect(),
            mode,
        }
    }

    /// Filter that matches leaf names.
    pub fn names<S: AsRef<str>>(entries: &[S]) -> Self {
        Self::new(entries, IgnoreMode::LeafName)
    }

    pub fn mode(&self) -> IgnoreMode {
        self.mode
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` when `field` under `prefix` must be skipped.
    pub fn is_ignored(&self, prefix: &[String], field: &str) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        match self.mode {
            IgnoreMode::LeafName => self.contains(field),
            IgnoreMode::DottedPath => self.contains(&PathBuilder::dotted(prefix, field)),
        }
    }

    fn contains(&self, candidate: &str) -> bool {
        self.entries.iter().any(|e| e == candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_filter_ignores_nothing() {
        let f = IgnoreFilter::default();
        assert!(!f.is_ignored(&[], "anything"));
        assert!(f.is_empty());
    }

    #[test]
    fn leaf_mode_matches_at_any_depth() {
        let f = IgnoreFilter::names(&["updated_at"]);
        assert!(f.is_ignored(&[], "updated_at"));
        assert!(f.is_ignored(&prefix(&["a", "b"]), "updated_at"));
        assert!(!f.is_ignored(&prefix(&["updated_at"]), "x"));
    }

    #[test]
    fn leaf_mode_is_exact() {
        let f = IgnoreFilter::names(&["name"]);
        assert!(!f.is_ignored(&[], "names"));
        assert!(!f.is_ignored(&[], "Name"));
        assert!(!f.is_ignored(&[], "nam"));
    }

    #[test]
    fn path_mode_matches_only_the_full_path() {
        let f = IgnoreFilter::new(&["a.b"], IgnoreMode::DottedPath);
        assert!(f.is_ignored(&prefix(&["a"]), "b"));
        assert!(!f.is_ignored(&[], "b"));
        assert!(!f.is_ignored(&prefix(&["x"]), "b"));
        assert!(!f.is_ignored(&prefix(&["a", "b"]), "c"));
    }

    #[test]
    fn mode_names() {
        let leaf: IgnoreMode = serde_json::from_str("\"leaf\"").unwrap();
        let path: IgnoreMode = serde_json::from_str("\"path\"").unwrap();
        assert_eq!(leaf, IgnoreMode::LeafName);
        assert_eq!(path, IgnoreMode::DottedPath);
        assert_eq!(serde_json::to_string(&IgnoreMode::DottedPath).unwrap(), "\"path\"");
    }
}
