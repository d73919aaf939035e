//! Document comparison: walk two documents and emit patch operations.
//!
//! Traversal is iterative. Each pending pair of sub-documents is a
//! [`CompareFrame`] on a FIFO worklist, so nesting depth never grows the
//! call stack. Arrays are compared as opaque values: equal arrays emit
//! nothing, any other array change replaces the whole array.

use std::collections::{HashMap, HashSet, VecDeque};

use bsondiff_types::{Document, Value};
use tracing::{debug, trace};

use crate::ignore::{IgnoreFilter, IgnoreMode};
use crate::patch::{Operation, PatchDocument};
use crate::path::PathBuilder;

/// One pending pairwise comparison of sub-documents.
#[derive(Debug)]
pub struct CompareFrame<'a> {
    pub left: &'a Document,
    pub right: &'a Document,
    /// Field names from the root to these documents.
    pub prefix: Vec<String>,
}

/// State of a single compare run.
pub struct CompareContext<'a> {
    ignore: IgnoreFilter,
    worklist: VecDeque<CompareFrame<'a>>,
    operations: Vec<Operation>,
}

impl<'a> CompareContext<'a> {
    pub fn new(left: &'a Document, right: &'a Document, ignore: IgnoreFilter) -> Self {
        let mut worklist = VecDeque::new();
        worklist.push_back(CompareFrame {
            left,
            right,
            prefix: Vec::new(),
        });
        Self {
            ignore,
            worklist,
            operations: Vec::new(),
        }
    }

    /// Run the comparison to completion and fold the result.
    pub fn compare(mut self) -> PatchDocument {
        let mut frames = 0usize;
        while let Some(frame) = self.worklist.pop_front() {
            frames += 1;
            self.process(frame);
        }
        let patch = PatchDocument::from_operations(self.operations);
        let stats = patch.stats();
        debug!(
            frames,
            sets = stats.sets,
            unsets = stats.unsets,
            "comparison finished"
        );
        patch
    }

    fn process(&mut self, frame: CompareFrame<'a>) {
        let CompareFrame {
            left,
            right,
            prefix,
        } = frame;
        debug!(
            path = %prefix.join("."),
            left_fields = left.len(),
            right_fields = right.len(),
            "compare frame"
        );

        let right_fields: HashMap<&str, &'a Value> =
            right.iter().map(|(k, v)| (k.as_str(), v)).collect();
        let mut visited: HashSet<&str> = HashSet::with_capacity(right_fields.len());

        for (key, left_value) in left.iter() {
            let key = key.as_str();
            let ignored = self.ignore.is_ignored(&prefix, key);
            let Some(&right_value) = right_fields.get(key) else {
                if !ignored {
                    self.emit(Operation::Unset(PathBuilder::join(&prefix, key)));
                }
                continue;
            };
            visited.insert(key);
            if ignored {
                continue;
            }
            match (left_value, right_value) {
                // Equal sub-documents produce an empty frame.
                (Value::Document(l), Value::Document(r)) => {
                    self.worklist.push_back(CompareFrame {
                        left: l,
                        right: r,
                        prefix: PathBuilder::join(&prefix, key),
                    });
                }
                _ if left_value == right_value => {}
                _ => self.emit(Operation::Set(
                    PathBuilder::join(&prefix, key),
                    right_value.clone(),
                )),
            }
        }

        for (key, right_value) in right.iter() {
            let key = key.as_str();
            if visited.contains(key) || self.ignore.is_ignored(&prefix, key) {
                continue;
            }
            self.emit(Operation::Set(
                PathBuilder::join(&prefix, key),
                right_value.clone(),
            ));
        }
    }

    fn emit(&mut self, op: Operation) {
        trace!(group = %op.group(), path = %op.path().join("."), "emit operation");
        self.operations.push(op);
    }
}

/// Compare two documents, ignoring fields by leaf name.
pub fn compare<S: AsRef<str>>(left: &Document, right: &Document, ignore: &[S]) -> PatchDocument {
    compare_with(left, right, IgnoreFilter::new(ignore, IgnoreMode::LeafName))
}

/// Compare two documents with an explicit ignore filter.
pub fn compare_with(left: &Document, right: &Document, ignore: IgnoreFilter) -> PatchDocument {
    CompareContext::new(left, right, ignore).compare()
}
