//! Diff engine for bsondiff.
//!
//! Compares two documents field by field and produces a MongoDB-style update
//! patch: `$unset` for removed fields, `$set` for added or changed ones, each
//! addressed by its dotted path.
//!
//! # Key Types
//!
//! - [`CompareContext`] / [`CompareFrame`] -- Iterative worklist comparison
//! - [`PatchDocument`] / [`Operation`] -- Folded `$set`/`$unset` result
//! - [`PatchBuilder`] / [`PathBuilder`] -- Nested-document and path helpers
//! - [`IgnoreFilter`] / [`IgnoreMode`] -- Field exclusion
//! - [`DiffOptions`] -- Serializable diff configuration
//!
//! ```
//! use serde_json::json;
//!
//! let patch = bsondiff_core::diff(
//!     &json!({ "a": { "b": "c" } }),
//!     &json!({ "a": { "e": "d" } }),
//!     &[] as &[&str],
//! )
//! .unwrap();
//! assert_eq!(
//!     serde_json::Value::Object(patch),
//!     json!({ "$unset": { "a.b": true }, "$set": { "a.e": "d" } })
//! );
//! ```

pub mod apply;
pub mod compare;
pub mod error;
pub mod ignore;
pub mod options;
pub mod patch;
pub mod path;

use bsondiff_codec::to_document;
use bsondiff_types::Document;
use serde::Serialize;
use serde_json::{Map, Value as Json};

pub use compare::{compare, compare_with, CompareContext, CompareFrame};
pub use error::{DiffError, DiffResult};
pub use ignore::{IgnoreFilter, IgnoreMode};
pub use options::DiffOptions;
pub use patch::{DiffStats, Group, Operation, PatchBuilder, PatchDocument};
pub use path::PathBuilder;

/// Diff two serializable values, ignoring fields by leaf name.
///
/// Both values must serialize to maps. The result is the patch in canonical
/// Extended JSON form, so integer and double widths survive; it is empty when
/// the inputs are equal.
pub fn diff<L, R, S>(left: &L, right: &R, ignore: &[S]) -> DiffResult<Map<String, Json>>
where
    L: Serialize + ?Sized,
    R: Serialize + ?Sized,
    S: AsRef<str>,
{
    diff_with_options(left, right, &DiffOptions::ignoring(ignore))
}

/// Diff two serializable values under the given options.
pub fn diff_with_options<L, R>(
    left: &L,
    right: &R,
    options: &DiffOptions,
) -> DiffResult<Map<String, Json>>
where
    L: Serialize + ?Sized,
    R: Serialize + ?Sized,
{
    let left = to_document(left)?;
    let right = to_document(right)?;
    Ok(diff_documents(&left, &right, options).to_map()?)
}

/// Diff two documents under the given options.
pub fn diff_documents(left: &Document, right: &Document, options: &DiffOptions) -> PatchDocument {
    compare_with(left, right, options.filter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsondiff_codec::EncodingError;
    use serde_json::json;

    const NONE: &[&str] = &[];

    #[derive(Serialize)]
    struct User {
        name: String,
        age: u32,
        address: Address,
    }

    #[derive(Serialize)]
    struct Address {
        city: String,
        zip: Option<String>,
    }

    #[test]
    fn json_inputs() {
        let patch = diff(&json!({ "b": "c" }), &json!({ "a": "c" }), NONE).unwrap();
        assert_eq!(
            Json::Object(patch),
            json!({ "$unset": { "b": true }, "$set": { "a": "c" } })
        );
    }

    #[test]
    fn struct_inputs() {
        let user = |age, zip: Option<&str>| User {
            name: "ada".into(),
            age,
            address: Address {
                city: "London".into(),
                zip: zip.map(String::from),
            },
        };
        let before = user(36, None);
        let after = user(37, Some("N1"));
        let patch = diff(&before, &after, NONE).unwrap();
        assert_eq!(
            Json::Object(patch),
            json!({ "$set": { "age": { "$numberLong": "37" }, "address.zip": "N1" } })
        );
    }

    #[test]
    fn equal_inputs_give_empty_map() {
        let v = json!({ "a": [1, 2, { "b": null }] });
        assert!(diff(&v, &v, NONE).unwrap().is_empty());
    }

    #[test]
    fn ignore_list() {
        let patch = diff(
            &json!({ "v": 1, "meta": { "ts": 1 } }),
            &json!({ "v": 1, "meta": { "ts": 2 } }),
            &["ts"],
        )
        .unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn path_mode_options() {
        let options = DiffOptions {
            ignore: vec!["meta.ts".into()],
            ignore_mode: IgnoreMode::DottedPath,
        };
        let patch = diff_with_options(
            &json!({ "ts": 1, "meta": { "ts": 1 } }),
            &json!({ "ts": 2, "meta": { "ts": 2 } }),
            &options,
        )
        .unwrap();
        assert_eq!(
            Json::Object(patch),
            json!({ "$set": { "ts": { "$numberLong": "2" } } })
        );
    }

    #[test]
    fn widened_integer_is_visible_in_output() {
        #[derive(Serialize)]
        struct Narrow {
            n: i32,
        }
        #[derive(Serialize)]
        struct Wide {
            n: i64,
        }

        let patch = diff(&Narrow { n: 5 }, &Wide { n: 5 }, NONE).unwrap();
        let set = patch["$set"]["n"].clone();
        assert_eq!(set, json!({ "$numberLong": "5" }));
        assert_eq!(
            bsondiff_codec::from_extended_json(&set).unwrap(),
            bsondiff_types::Value::Int64(5)
        );
        assert!(diff(&Narrow { n: 5 }, &Narrow { n: 5 }, NONE).unwrap().is_empty());
    }

    #[test]
    fn non_document_input_is_an_encoding_error() {
        let err = diff(&json!([1, 2]), &json!({}), NONE).unwrap_err();
        assert!(matches!(
            err,
            DiffError::Encoding(EncodingError::NotADocument(_))
        ));
        let err = diff(&json!({}), &42, NONE).unwrap_err();
        assert!(matches!(err, DiffError::Encoding(_)));
    }

    #[test]
    fn out_of_range_integer_is_an_encoding_error() {
        let err = diff(&json!({ "n": u64::MAX }), &json!({}), NONE).unwrap_err();
        assert!(matches!(
            err,
            DiffError::Encoding(EncodingError::IntegerOutOfRange(_))
        ));
    }
}

#[cfg(test)]
mod properties {
    use super::*;
    use bsondiff_types::Value;
    use proptest::prelude::*;

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i32>().prop_map(Value::Int32),
            any::<i64>().prop_map(Value::Int64),
            any::<bool>().prop_map(Value::Boolean),
            "[a-z]{0,4}".prop_map(Value::String),
            Just(Value::Null),
            (-1.0e6..1.0e6f64).prop_map(Value::Double),
        ]
    }

    fn document_with_keys(key: &'static str) -> impl Strategy<Value = Document> {
        let leaf = scalar();
        let value = leaf.prop_recursive(3, 24, 4, move |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..3).prop_map(Value::Array),
                prop::collection::vec((key, inner), 0..4)
                    .prop_map(|fields| Value::Document(fields.into_iter().collect())),
            ]
        });
        prop::collection::vec((key, value), 0..5)
            .prop_map(|fields| fields.into_iter().collect::<Document>())
    }

    fn document() -> impl Strategy<Value = Document> {
        document_with_keys("[a-e]")
    }

    /// Field names that may contain `.`, so distinct fields can share a dotted path.
    fn dotted_document() -> impl Strategy<Value = Document> {
        document_with_keys("[a-c](\\.[a-c])?")
    }

    fn field_names(doc: &Document, out: &mut Vec<String>) {
        for (key, value) in doc.iter() {
            out.push(key.clone());
            if let Value::Document(inner) = value {
                field_names(inner, out);
            }
        }
    }

    proptest! {
        #[test]
        fn self_diff_is_empty(doc in document()) {
            prop_assert!(compare(&doc, &doc, &[] as &[&str]).is_empty());
        }

        #[test]
        fn set_and_unset_are_disjoint(a in dotted_document(), b in dotted_document()) {
            let patch = compare(&a, &b, &[] as &[&str]);
            for path in patch.set_paths() {
                prop_assert!(!patch.is_unset(path));
            }
        }

        #[test]
        fn ignored_names_never_emitted(a in document(), b in document(), name in "[a-e]") {
            let patch = compare(&a, &b, &[name.as_str()]);
            for path in patch.set_paths().chain(patch.unset_paths()) {
                prop_assert!(path.split('.').all(|segment| segment != name));
            }
        }

        #[test]
        fn apply_reproduces_target(a in document(), b in document()) {
            let patch = compare(&a, &b, &[] as &[&str]);
            prop_assert_eq!(patch.apply_to(&a), b);
        }

        #[test]
        fn unrelated_ignore_entries_change_nothing(a in document(), b in document()) {
            let mut names = Vec::new();
            field_names(&a, &mut names);
            let unrelated: Vec<String> = names.iter().map(|n| format!("{n}_absent")).collect();
            prop_assert_eq!(
                compare(&a, &b, unrelated.as_slice()),
                compare(&a, &b, &[] as &[&str])
            );
        }
    }
}
