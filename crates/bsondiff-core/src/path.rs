//! Field path construction.
//!
//! A path is the sequence of field names leading from the root document to
//! a field. Patches address fields by the dotted form of that sequence.

/// Separator between field names in a dotted path.
pub const PATH_SEPARATOR: char = '.';

/// Builds child paths from a parent prefix.
pub struct PathBuilder;

impl PathBuilder {
    /// `prefix` followed by `field`, as an owned sequence.
    pub fn join(prefix: &[String], field: &str) -> Vec<String> {
        let mut path = Vec::with_capacity(prefix.len() + 1);
        path.extend_from_slice(prefix);
        path.push(field.to_string());
        path
    }

    /// `prefix` followed by `field`, joined with `.`.
    pub fn dotted(prefix: &[String], field: &str) -> String {
        let mut out = String::with_capacity(
            prefix.iter().map(|s| s.len() + 1).sum::<usize>() + field.len(),
        );
        for segment in prefix {
            out.push_str(segment);
            out.push(PATH_SEPARATOR);
        }
        out.push_str(field);
        out
    }

    /// Split a dotted path into its segments.
    pub fn split(dotted: &str) -> Vec<&str> {
        dotted.split(PATH_SEPARATOR).collect()
    }
}
