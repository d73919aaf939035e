//! Applying a patch to a document.
//!
//! Dotted paths are split on `.`, so a field whose own name contains a dot
//! cannot be addressed exactly.

use bsondiff_types::{Document, Value};
use tracing::debug;

use crate::patch::PatchDocument;
use crate::path::PathBuilder;

impl PatchDocument {
    /// Apply this patch to `doc` and return the updated copy.
    ///
    /// `$unset` runs first: each path is removed, and a path whose parent is
    /// missing or not a document is skipped. `$set` runs second: missing or
    /// non-document parents are replaced by empty documents and the leaf is
    /// written.
    pub fn apply_to(&self, doc: &Document) -> Document {
        let mut out = doc.clone();
        let stats = self.stats();
        debug!(sets = stats.sets, unsets = stats.unsets, "apply patch");
        for path in self.unset_paths() {
            unset_path(&mut out, path);
        }
        for path in self.set_paths() {
            if let Some(value) = self.get_set(path) {
                set_path(&mut out, path, value.clone());
            }
        }
        out
    }
}

fn unset_path(root: &mut Document, dotted: &str) {
    let segments = PathBuilder::split(dotted);
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };
    let mut node = root;
    for segment in parents {
        node = match node.get_mut(segment) {
            Some(Value::Document(child)) => child,
            _ => return,
        };
    }
    node.remove(leaf);
}

fn set_path(root: &mut Document, dotted: &str, value: Value) {
    let segments = PathBuilder::split(dotted);
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };
    let mut node = root;
    for segment in parents {
        node = node.document_entry(segment);
    }
    node.insert(*leaf, value);
}
