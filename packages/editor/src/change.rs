//! # Document Change
//!
//! The history unit: an ordered op list plus before/after state snapshots
//! (selection and whatever else the host tracks) and an info bag for
//! listeners. Inverting a change inverts each op in reverse order and swaps
//! the state snapshots; replays are marked `replay` so history never
//! re-records them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use substance_model::{Op, PropertyPath};

/// String-keyed state bag carried on both sides of a change. Selections are
/// the typical payload, serialized as JSON so hosts can carry their own
/// keys.
pub type StateMap = BTreeMap<String, Value>;

/// State key conventionally used for selection snapshots.
pub const STATE_SELECTION: &str = "selection";

/// Listener-facing metadata attached to a change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeInfo {
    /// True for undo/redo replays; replays are never recorded in history.
    #[serde(default)]
    pub replay: bool,

    /// Free-form tags for listeners (e.g. the tool that produced the edit).
    #[serde(default)]
    pub extra: StateMap,
}

impl ChangeInfo {
    pub fn replay() -> Self {
        Self {
            replay: true,
            extra: StateMap::new(),
        }
    }

    pub fn tagged(key: impl Into<String>, value: Value) -> Self {
        let mut info = Self::default();
        info.extra.insert(key.into(), value);
        info
    }
}

/// A committed (or replayed) sequence of ops with its surrounding state.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentChange {
    pub ops: Vec<Op>,
    pub before: StateMap,
    pub after: StateMap,
    pub timestamp: DateTime<Utc>,
    pub info: ChangeInfo,
}

impl DocumentChange {
    pub fn new(ops: Vec<Op>, before: StateMap, after: StateMap, info: ChangeInfo) -> Self {
        Self {
            ops,
            before,
            after,
            timestamp: Utc::now(),
            info,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The inverse change: each op inverted, in reverse order; before and
    /// after swapped; marked as a replay.
    pub fn invert(&self) -> DocumentChange {
        DocumentChange {
            ops: self.ops.iter().rev().map(Op::invert).collect(),
            before: self.after.clone(),
            after: self.before.clone(),
            timestamp: Utc::now(),
            info: ChangeInfo {
                replay: true,
                extra: self.info.extra.clone(),
            },
        }
    }

    /// A re-application of this change (redo), marked as a replay.
    pub fn replayed(&self) -> DocumentChange {
        DocumentChange {
            ops: self.ops.clone(),
            before: self.before.clone(),
            after: self.after.clone(),
            timestamp: Utc::now(),
            info: ChangeInfo {
                replay: true,
                extra: self.info.extra.clone(),
            },
        }
    }

    /// Property paths this change touches. `set`/`update` contribute their
    /// target path; `create`/`delete` contribute every property path of the
    /// node, so path subscribers hear about appearing and vanishing nodes.
    pub fn touched_paths(&self) -> BTreeSet<PropertyPath> {
        let mut paths = BTreeSet::new();
        for op in &self.ops {
            match op {
                Op::Create { node } | Op::Delete { node } => {
                    paths.extend(node.property_paths());
                }
                Op::Set { path, .. } | Op::Update { path, .. } => {
                    paths.insert(path.clone());
                }
            }
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use substance_model::{Diff, Node, PropertyValue};

    fn content() -> PropertyPath {
        PropertyPath::new("p1", "content")
    }

    #[test]
    fn test_invert_reverses_and_swaps_state() {
        let mut before = StateMap::new();
        before.insert("selection".into(), serde_json::json!({"type": "null"}));
        let mut after = StateMap::new();
        after.insert("selection".into(), serde_json::json!({"type": "property"}));

        let change = DocumentChange::new(
            vec![
                Op::Set {
                    path: content(),
                    value: PropertyValue::Str("Hi".into()),
                    original: PropertyValue::Str("Hello".into()),
                },
                Op::Update {
                    path: content(),
                    diff: Diff::insert_text(0, "x"),
                },
            ],
            before.clone(),
            after.clone(),
            ChangeInfo::default(),
        );

        let inverted = change.invert();
        assert!(inverted.info.replay);
        assert_eq!(inverted.before, after);
        assert_eq!(inverted.after, before);
        assert_eq!(inverted.ops.len(), 2);
        // reversed order: the update's inverse comes first
        assert!(matches!(inverted.ops[0], Op::Update { .. }));
        assert_eq!(inverted.ops[1], change.ops[0].invert());
    }

    #[test]
    fn test_touched_paths_cover_create_and_set() {
        let change = DocumentChange::new(
            vec![
                Op::Create {
                    node: Node::new("p2", "paragraph").with("content", "x"),
                },
                Op::Set {
                    path: content(),
                    value: PropertyValue::Str("y".into()),
                    original: PropertyValue::Str("x".into()),
                },
            ],
            StateMap::new(),
            StateMap::new(),
            ChangeInfo::default(),
        );
        let paths = change.touched_paths();
        assert!(paths.contains(&PropertyPath::new("p2", "content")));
        assert!(paths.contains(&content()));
    }
}
