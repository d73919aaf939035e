//! Patch construction: `$set` / `$unset` update documents.
//!
//! [`PatchBuilder::apply`] places a value at a path inside a nested
//! document, creating intermediate documents on the way down. A
//! [`PatchDocument`] is the folded result of a diff: at most the two groups
//! `$unset` and `$set`, each mapping dotted paths to a value.

use std::collections::HashSet;
use std::fmt;

use bsondiff_codec::{encode_document, SerializationResult};
use bsondiff_types::extjson::document_to_extended_json;
use bsondiff_types::{Document, ExtJsonMode, Value};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as Json};
use tracing::{debug, trace};

use crate::error::DiffError;

/// Update-operator group of a patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Group {
    Unset,
    Set,
}

impl Group {
    pub fn as_str(self) -> &'static str {
        match self {
            Group::Unset => "$unset",
            Group::Set => "$set",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single change emitted by the compare engine.
///
/// Paths are the full sequence of field names from the root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// The field was removed.
    Unset(Vec<String>),
    /// The field was added or changed to the given value.
    Set(Vec<String>, Value),
}

impl Operation {
    pub fn group(&self) -> Group {
        match self {
            Operation::Unset(_) => Group::Unset,
            Operation::Set(..) => Group::Set,
        }
    }

    pub fn path(&self) -> &[String] {
        match self {
            Operation::Unset(path) | Operation::Set(path, _) => path,
        }
    }
}

/// Builds nested documents one path at a time.
pub struct PatchBuilder;

impl PatchBuilder {
    /// Set `value` at `path` below `root[group]` and return the new root.
    ///
    /// Every non-leaf segment that is missing or holds a non-document is
    /// replaced by an empty document. Siblings are left untouched. An empty
    /// path returns `root` unchanged.
    pub fn apply<S: AsRef<str>>(
        mut root: Document,
        group: Group,
        path: &[S],
        value: Value,
    ) -> Document {
        let Some((leaf, parents)) = path.split_last() else {
            return root;
        };
        let mut node = root.document_entry(group.as_str());
        for segment in parents {
            node = node.document_entry(segment.as_ref());
        }
        node.insert(leaf.as_ref(), value);
        root
    }
}

/// Operation counts for a patch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    pub sets: usize,
    pub unsets: usize,
}

impl DiffStats {
    pub fn total(&self) -> usize {
        self.sets + self.unsets
    }
}

/// The result of a diff: `{"$unset": {path: true}, "$set": {path: value}}`.
///
/// Groups with no operations are absent, so an empty patch is `{}`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatchDocument {
    root: Document,
}

impl PatchDocument {
    /// Fold operations into a patch, `$unset` entries first, then `$set`,
    /// each in the order given.
    ///
    /// A field literally named `a.b` and a nested `a` -> `b` share the dotted
    /// path `a.b`. When such a path is both unset and set, the `$set` wins and
    /// the `$unset` is dropped, so no path ever appears in both groups.
    pub fn from_operations(ops: impl IntoIterator<Item = Operation>) -> Self {
        let (unsets, sets): (Vec<_>, Vec<_>) =
            ops.into_iter().partition(|op| op.group() == Group::Unset);
        let set_paths: HashSet<String> = sets.iter().map(|op| op.path().join(".")).collect();
        let mut root = Document::new();
        for op in unsets.into_iter().chain(sets) {
            let dotted = op.path().join(".");
            let (group, value) = match op {
                Operation::Unset(_) if set_paths.contains(&dotted) => {
                    debug!(path = %dotted, "dropping $unset shadowed by $set");
                    continue;
                }
                Operation::Unset(_) => (Group::Unset, Value::Boolean(true)),
                Operation::Set(_, value) => (Group::Set, value),
            };
            trace!(group = %group, path = %dotted, "fold operation");
            root = PatchBuilder::apply(root, group, &[dotted], value);
        }
        Self { root }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    fn group(&self, group: Group) -> Option<&Document> {
        self.root.get_document(group.as_str())
    }

    /// Dotted paths in the `$set` group, in emission order.
    pub fn set_paths(&self) -> impl Iterator<Item = &str> {
        self.group(Group::Set)
            .into_iter()
            .flat_map(|d| d.keys().map(String::as_str))
    }

    /// Dotted paths in the `$unset` group, in emission order.
    pub fn unset_paths(&self) -> impl Iterator<Item = &str> {
        self.group(Group::Unset)
            .into_iter()
            .flat_map(|d| d.keys().map(String::as_str))
    }

    /// The new value for `path`, if the patch sets it.
    pub fn get_set(&self, path: &str) -> Option<&Value> {
        self.group(Group::Set).and_then(|d| d.get(path))
    }

    pub fn is_unset(&self, path: &str) -> bool {
        self.group(Group::Unset)
            .is_some_and(|d| d.contains_key(path))
    }

    pub fn stats(&self) -> DiffStats {
        DiffStats {
            sets: self.group(Group::Set).map_or(0, Document::len),
            unsets: self.group(Group::Unset).map_or(0, Document::len),
        }
    }

    pub fn as_document(&self) -> &Document {
        &self.root
    }

    pub fn into_document(self) -> Document {
        self.root
    }

    /// The patch as a JSON map in canonical Extended JSON form.
    ///
    /// Numbers keep their BSON type (`{"$numberLong": "5"}`), so a `$set`
    /// caused by a type change stays distinguishable from the old value.
    pub fn to_map(&self) -> SerializationResult<Map<String, Json>> {
        Ok(self.to_map_with(ExtJsonMode::Canonical))
    }

    /// The patch as a JSON map in the requested Extended JSON form.
    pub fn to_map_with(&self, mode: ExtJsonMode) -> Map<String, Json> {
        document_to_extended_json(&self.root, mode)
    }

    /// The patch as a BSON document.
    pub fn to_bson_bytes(&self) -> SerializationResult<Vec<u8>> {
        encode_document(&self.root)
    }
}

impl From<PatchDocument> for Document {
    fn from(patch: PatchDocument) -> Self {
        patch.root
    }
}

/// Accepts a document holding only `$set` and `$unset` groups, each a
/// document. Empty groups are dropped.
impl TryFrom<Document> for PatchDocument {
    type Error = DiffError;

    fn try_from(doc: Document) -> Result<Self, Self::Error> {
        let mut root = Document::new();
        for (key, value) in doc {
            let group = match key.as_str() {
                "$unset" => Group::Unset,
                "$set" => Group::Set,
                other => {
                    return Err(DiffError::InvalidPatch(format!(
                        "unexpected top-level key {other:?}"
                    )))
                }
            };
            let entries = match value {
                Value::Document(entries) => entries,
                other => {
                    return Err(DiffError::InvalidPatch(format!(
                        "{group} must be a document, got {}",
                        other.element_type()
                    )))
                }
            };
            if !entries.is_empty() {
                root.insert(group.as_str(), entries);
            }
        }
        Ok(Self { root })
    }
}

impl Serialize for PatchDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

impl fmt::Display for PatchDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.root, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsondiff_types::doc;

    fn set(path: &[&str], value: impl Into<Value>) -> Operation {
        Operation::Set(path.iter().map(|s| s.to_string()).collect(), value.into())
    }

    fn unset(path: &[&str]) -> Operation {
        Operation::Unset(path.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn single_segment() {
        let root = PatchBuilder::apply(Document::new(), Group::Set, &["a"], "b".into());
        assert_eq!(root, doc! { "$set": doc! { "a": "b" } });
    }

    #[test]
    fn deep_path_builds_chain() {
        let root = PatchBuilder::apply(
            Document::new(),
            Group::Set,
            &["a", "b", "c", "d", "e", "f"],
            "g".into(),
        );
        let expected = doc! {
            "$set": doc! { "a": doc! { "b": doc! { "c": doc! { "d": doc! { "e": doc! { "f": "g" } } } } } }
        };
        assert_eq!(root, expected);

        let root = PatchBuilder::apply(root, Group::Set, &["a", "b", "x"], "y".into());
        let b = root
            .get_document("$set")
            .and_then(|d| d.get_document("a"))
            .and_then(|d| d.get_document("b"))
            .unwrap();
        assert_eq!(b.get("x"), Some(&Value::from("y")));
        assert!(b.get_document("c").is_some());
    }

    #[test]
    fn scalar_intermediate_is_overwritten() {
        let root = PatchBuilder::apply(Document::new(), Group::Set, &["a", "b"], 1.into());
        let root = PatchBuilder::apply(root, Group::Set, &["a", "b", "c"], 2.into());
        assert_eq!(
            root,
            doc! { "$set": doc! { "a": doc! { "b": doc! { "c": 2 } } } }
        );
    }

    #[test]
    fn repeated_apply_is_idempotent_and_last_write_wins() {
        let once = PatchBuilder::apply(Document::new(), Group::Set, &["k"], 1.into());
        let twice = PatchBuilder::apply(once.clone(), Group::Set, &["k"], 1.into());
        assert_eq!(once, twice);

        let overwritten = PatchBuilder::apply(twice, Group::Set, &["k"], 2.into());
        assert_eq!(overwritten, doc! { "$set": doc! { "k": 2 } });
    }

    #[test]
    fn disjoint_paths_commute() {
        let ab = PatchBuilder::apply(Document::new(), Group::Set, &["a", "x"], 1.into());
        let ab = PatchBuilder::apply(ab, Group::Set, &["b"], 2.into());
        let ba = PatchBuilder::apply(Document::new(), Group::Set, &["b"], 2.into());
        let ba = PatchBuilder::apply(ba, Group::Set, &["a", "x"], 1.into());
        assert_eq!(ab, ba);
    }

    #[test]
    fn empty_path_is_a_no_op() {
        let root = PatchBuilder::apply::<&str>(doc! { "x": 1 }, Group::Set, &[], 2.into());
        assert_eq!(root, doc! { "x": 1 });
    }

    #[test]
    fn fold_orders_unset_before_set() {
        let patch = PatchDocument::from_operations(vec![
            set(&["a"], "c"),
            unset(&["b"]),
            set(&["x", "y"], 1),
        ]);
        let keys: Vec<_> = patch.as_document().keys().cloned().collect();
        assert_eq!(keys, vec!["$unset", "$set"]);
        assert_eq!(patch.unset_paths().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(patch.set_paths().collect::<Vec<_>>(), vec!["a", "x.y"]);
        assert!(patch.is_unset("b"));
        assert_eq!(patch.get_set("x.y"), Some(&Value::Int32(1)));
        assert_eq!(patch.stats(), DiffStats { sets: 2, unsets: 1 });
    }

    #[test]
    fn set_shadows_unset_on_same_dotted_path() {
        let patch = PatchDocument::from_operations(vec![
            unset(&["a.b"]),
            unset(&["c"]),
            set(&["a", "b"], 1),
        ]);
        assert_eq!(patch.unset_paths().collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(patch.set_paths().collect::<Vec<_>>(), vec!["a.b"]);
        assert!(!patch.is_unset("a.b"));
        assert_eq!(patch.stats(), DiffStats { sets: 1, unsets: 1 });
    }

    #[test]
    fn only_shadowed_unsets_leave_no_unset_group() {
        let patch = PatchDocument::from_operations(vec![unset(&["a.b"]), set(&["a", "b"], 1)]);
        assert_eq!(patch.to_string(), r#"{"$set":{"a.b":1}}"#);
    }

    #[test]
    fn to_map_keeps_integer_widths() {
        let patch = PatchDocument::from_operations(vec![
            set(&["n"], 5i64),
            set(&["m"], 5),
            unset(&["gone"]),
        ]);
        let map = patch.to_map().unwrap();
        assert_eq!(
            Json::Object(map),
            serde_json::json!({
                "$unset": { "gone": true },
                "$set": { "n": { "$numberLong": "5" }, "m": { "$numberInt": "5" } }
            })
        );
    }

    #[test]
    fn empty_patch() {
        let patch = PatchDocument::from_operations(Vec::new());
        assert!(patch.is_empty());
        assert_eq!(patch.to_string(), "{}");
        assert!(patch.to_map().unwrap().is_empty());
        assert_eq!(patch.stats().total(), 0);
    }

    #[test]
    fn patch_from_document() {
        let patch = PatchDocument::try_from(doc! {
            "$set": doc! { "a.b": 1 },
            "$unset": doc! {},
        })
        .unwrap();
        assert_eq!(patch.set_paths().collect::<Vec<_>>(), vec!["a.b"]);
        assert_eq!(patch.stats().unsets, 0);
        assert_eq!(patch.as_document().len(), 1);

        let err = PatchDocument::try_from(doc! { "$inc": doc! { "n": 1 } }).unwrap_err();
        assert!(matches!(err, DiffError::InvalidPatch(_)));
        let err = PatchDocument::try_from(doc! { "$set": 1 }).unwrap_err();
        assert!(matches!(err, DiffError::InvalidPatch(_)));
    }

    #[test]
    fn wire_shape() {
        let patch = PatchDocument::from_operations(vec![unset(&["b"]), set(&["a"], "c")]);
        assert_eq!(patch.to_string(), r#"{"$unset":{"b":true},"$set":{"a":"c"}}"#);
        let bytes = patch.to_bson_bytes().unwrap();
        assert_eq!(
            bsondiff_codec::decode_document(&bytes).unwrap(),
            patch.clone().into_document()
        );
    }
}
