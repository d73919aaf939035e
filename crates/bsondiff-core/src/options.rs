use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DiffError, DiffResult};
use crate::ignore::{IgnoreFilter, IgnoreMode};

/// Configuration for a diff run.
///
/// Loadable from TOML:
///
/// ```toml
/// ignore = ["updated_at", "_version"]
/// ignore_mode = "leaf"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiffOptions {
    /// Field names (or dotted paths, see `ignore_mode`) excluded from the diff.
    pub ignore: Vec<String>,
    /// How `ignore` entries are matched.
    pub ignore_mode: IgnoreMode,
}

impl DiffOptions {
    /// Options ignoring the given leaf names.
    pub fn ignoring<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            ignore: names.iter().map(|n| n.as_ref().to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(s: &str) -> DiffResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> DiffResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DiffError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let options = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), ignore = options.ignore.len(), "loaded diff options");
        Ok(options)
    }

    pub fn filter(&self) -> IgnoreFilter {
        IgnoreFilter::new(self.ignore.as_slice(), self.ignore_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let options = DiffOptions::default();
        assert!(options.ignore.is_empty());
        assert_eq!(options.ignore_mode, IgnoreMode::LeafName);
        assert_eq!(DiffOptions::from_toml_str("").unwrap(), options);
    }

    #[test]
    fn parses_toml() {
        let options = DiffOptions::from_toml_str(
            r#"
            ignore = ["a.b", "c"]
            ignore_mode = "path"
            "#,
        )
        .unwrap();
        assert_eq!(options.ignore, vec!["a.b", "c"]);
        assert_eq!(options.ignore_mode, IgnoreMode::DottedPath);
        assert_eq!(options.filter().mode(), IgnoreMode::DottedPath);
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = DiffOptions::from_toml_str("ignored = [\"x\"]").unwrap_err();
        assert!(matches!(err, DiffError::Config(_)));
    }

    #[test]
    fn bad_mode_rejected() {
        assert!(DiffOptions::from_toml_str("ignore_mode = \"glob\"").is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ignore = [\"updated_at\"]").unwrap();
        let options = DiffOptions::load(file.path()).unwrap();
        assert_eq!(options, DiffOptions::ignoring(&["updated_at"]));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DiffOptions::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, DiffError::ConfigIo { .. }));
    }
}
