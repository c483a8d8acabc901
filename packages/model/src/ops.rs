//! # Operation Primitives
//!
//! The four invertible mutations every document change is made of.
//!
//! ## Design
//!
//! 1. **Captured at apply**: an op carries enough state post-apply to invert
//!    itself without consulting the store (`Delete` holds the full record,
//!    `Set` holds the replaced value, splices hold the removed content).
//! 2. **Validated**: application verifies captured content against the store
//!    and fails with an [`OpError`] instead of corrupting state.
//! 3. **Pure inversion**: `invert()` never touches a store, so history
//!    survives concurrent tails.
//!
//! Wire form (serde):
//!
//! ```json
//! {"op": "create", "node": {...}}
//! {"op": "delete", "node": {...captured...}}
//! {"op": "set",    "path": ["id","prop"], "value": ..., "original": ...}
//! {"op": "update", "path": ["id","prop"], "diff": {"type": "string-splice", ...}}
//! ```

use crate::node::{DecodeError, Node};
use crate::property::{PropertyPath, PropertyValue};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The `InvalidOperation` family: the op references state that does not
/// exist or does not have the shape the op assumes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OpError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Unknown property '{property}' for node type '{node_type}'")]
    UnknownProperty {
        node_type: String,
        property: String,
    },

    #[error("Type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: PropertyPath,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Property {path} is not text")]
    NotText { path: PropertyPath },

    #[error("Property {path} is not an id list")]
    NotAList { path: PropertyPath },

    #[error("Property {path} is not a number")]
    NotANumber { path: PropertyPath },

    #[error("Splice out of range at {path}: offset {offset} + {len} exceeds length {actual}")]
    SpliceOutOfRange {
        path: PropertyPath,
        offset: usize,
        len: usize,
        actual: usize,
    },

    #[error("Splice mismatch at {path}: expected to remove {expected:?}, found {found:?}")]
    SpliceMismatch {
        path: PropertyPath,
        expected: String,
        found: String,
    },

    #[error("Annotation range [{start},{end}] out of bounds for {path} (length {len})")]
    AnnotationRange {
        path: PropertyPath,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("Dangling reference from '{from}' to missing node '{to}'")]
    DanglingReference { from: String, to: String },

    #[error("Node '{0}' is not a container")]
    NotAContainer(String),
}

pub type OpResult<T> = Result<T, OpError>;

/// Typed diff for the `update` op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Diff {
    /// Replace `delete` (the text currently at `offset`) with `insert`.
    /// Offsets are character-indexed.
    StringSplice {
        offset: usize,
        delete: String,
        insert: String,
    },

    /// Replace `remove` (the ids currently at `pos`) with `insert`.
    ListSplice {
        pos: usize,
        remove: Vec<String>,
        insert: Vec<String>,
    },

    /// Add `delta` to an integer property.
    NumberDelta { delta: i64 },
}

impl Diff {
    pub fn insert_text(offset: usize, insert: impl Into<String>) -> Self {
        Diff::StringSplice {
            offset,
            delete: String::new(),
            insert: insert.into(),
        }
    }

    pub fn insert_at(pos: usize, id: impl Into<String>) -> Self {
        Diff::ListSplice {
            pos,
            remove: Vec::new(),
            insert: vec![id.into()],
        }
    }

    pub fn remove_at(pos: usize, id: impl Into<String>) -> Self {
        Diff::ListSplice {
            pos,
            remove: vec![id.into()],
            insert: Vec::new(),
        }
    }

    /// The inverse diff. Pure: splices already carry both sides.
    pub fn invert(&self) -> Diff {
        match self {
            Diff::StringSplice {
                offset,
                delete,
                insert,
            } => Diff::StringSplice {
                offset: *offset,
                delete: insert.clone(),
                insert: delete.clone(),
            },
            Diff::ListSplice {
                pos,
                remove,
                insert,
            } => Diff::ListSplice {
                pos: *pos,
                remove: insert.clone(),
                insert: remove.clone(),
            },
            Diff::NumberDelta { delta } => Diff::NumberDelta { delta: -delta },
        }
    }

    /// Apply this diff to a property value, yielding the new value.
    /// Verifies the captured side (`delete` / `remove`) against the current
    /// content so a drifted store fails loudly.
    pub fn apply_to(&self, value: &PropertyValue, path: &PropertyPath) -> OpResult<PropertyValue> {
        match self {
            Diff::StringSplice {
                offset,
                delete,
                insert,
            } => {
                let text = value.as_str().ok_or_else(|| OpError::NotText {
                    path: path.clone(),
                })?;
                let delete_len = char_len(delete);
                let total = char_len(text);
                if *offset + delete_len > total {
                    return Err(OpError::SpliceOutOfRange {
                        path: path.clone(),
                        offset: *offset,
                        len: delete_len,
                        actual: total,
                    });
                }
                let start = byte_index(text, *offset);
                let end = byte_index(text, *offset + delete_len);
                let removed = &text[start..end];
                if removed != delete {
                    return Err(OpError::SpliceMismatch {
                        path: path.clone(),
                        expected: delete.clone(),
                        found: removed.to_string(),
                    });
                }
                let mut next = String::with_capacity(text.len() - removed.len() + insert.len());
                next.push_str(&text[..start]);
                next.push_str(insert);
                next.push_str(&text[end..]);
                Ok(PropertyValue::Str(next))
            }
            Diff::ListSplice {
                pos,
                remove,
                insert,
            } => {
                let ids = value.as_id_list().ok_or_else(|| OpError::NotAList {
                    path: path.clone(),
                })?;
                if *pos + remove.len() > ids.len() {
                    return Err(OpError::SpliceOutOfRange {
                        path: path.clone(),
                        offset: *pos,
                        len: remove.len(),
                        actual: ids.len(),
                    });
                }
                let removed = &ids[*pos..*pos + remove.len()];
                if removed != remove.as_slice() {
                    return Err(OpError::SpliceMismatch {
                        path: path.clone(),
                        expected: remove.join(","),
                        found: removed.join(","),
                    });
                }
                let mut next = Vec::with_capacity(ids.len() - remove.len() + insert.len());
                next.extend_from_slice(&ids[..*pos]);
                next.extend(insert.iter().cloned());
                next.extend_from_slice(&ids[*pos + remove.len()..]);
                Ok(PropertyValue::IdList(next))
            }
            Diff::NumberDelta { delta } => {
                let n = value.as_int().ok_or_else(|| OpError::NotANumber {
                    path: path.clone(),
                })?;
                Ok(PropertyValue::Int(n + delta))
            }
        }
    }
}

/// Atomic invertible mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Op {
    Create { node: Node },
    /// Carries the node record captured at apply time.
    Delete { node: Node },
    Set {
        path: PropertyPath,
        value: PropertyValue,
        original: PropertyValue,
    },
    Update { path: PropertyPath, diff: Diff },
}

/// Resolves a node id to its type name during wire decode; implemented by
/// the store.
pub trait NodeTypeLookup {
    fn node_type_of(&self, id: &str) -> Option<&str>;
}

impl Op {
    /// The inverse op. Pure: all required state was captured at apply time.
    pub fn invert(&self) -> Op {
        match self {
            Op::Create { node } => Op::Delete { node: node.clone() },
            Op::Delete { node } => Op::Create { node: node.clone() },
            Op::Set {
                path,
                value,
                original,
            } => Op::Set {
                path: path.clone(),
                value: original.clone(),
                original: value.clone(),
            },
            Op::Update { path, diff } => Op::Update {
                path: path.clone(),
                diff: diff.invert(),
            },
        }
    }

    /// The property path this op touches, if it targets a single property.
    pub fn path(&self) -> Option<&PropertyPath> {
        match self {
            Op::Set { path, .. } | Op::Update { path, .. } => Some(path),
            Op::Create { .. } | Op::Delete { .. } => None,
        }
    }

    /// Id of the node this op targets.
    pub fn node_id(&self) -> &str {
        match self {
            Op::Create { node } | Op::Delete { node } => node.id(),
            Op::Set { path, .. } | Op::Update { path, .. } => &path.node_id,
        }
    }

    /// Decode the wire form. `types` resolves node ids for `set` payloads,
    /// whose JSON is coerced against the schema-declared property type.
    pub fn from_json(
        schema: &Schema,
        types: &dyn NodeTypeLookup,
        value: &Value,
    ) -> Result<Op, DecodeError> {
        let obj = value
            .as_object()
            .ok_or_else(|| DecodeError::BadShape(format!("expected object, found {}", value)))?;
        let tag = obj
            .get("op")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingField("op"))?;

        let path_of = |obj: &serde_json::Map<String, Value>| -> Result<PropertyPath, DecodeError> {
            let raw = obj.get("path").ok_or(DecodeError::MissingField("path"))?;
            serde_json::from_value(raw.clone())
                .map_err(|e| DecodeError::BadShape(format!("invalid path: {}", e)))
        };

        match tag {
            "create" | "delete" => {
                let node_json = obj.get("node").ok_or(DecodeError::MissingField("node"))?;
                let node = Node::from_json(schema, node_json)?;
                Ok(if tag == "create" {
                    Op::Create { node }
                } else {
                    Op::Delete { node }
                })
            }
            "set" => {
                let path = path_of(obj)?;
                let node_type = types
                    .node_type_of(&path.node_id)
                    .ok_or_else(|| DecodeError::BadShape(format!(
                        "cannot resolve node '{}' for set decode",
                        path.node_id
                    )))?
                    .to_string();
                let declared = schema
                    .effective_properties(&node_type)
                    .map_err(|_| DecodeError::UnknownNodeType(node_type.clone()))?;
                let ty = declared
                    .get(&path.property)
                    .ok_or_else(|| DecodeError::UnknownProperty {
                        node_type,
                        property: path.property.clone(),
                    })?;
                let coerce = |field: &'static str| -> Result<PropertyValue, DecodeError> {
                    let raw = obj.get(field).ok_or(DecodeError::MissingField(field))?;
                    ty.coerce(raw).map_err(|message| DecodeError::BadValue {
                        property: path.property.clone(),
                        message,
                    })
                };
                let value = coerce("value")?;
                let original = coerce("original")?;
                Ok(Op::Set {
                    path,
                    value,
                    original,
                })
            }
            "update" => {
                let path = path_of(obj)?;
                let raw = obj.get("diff").ok_or(DecodeError::MissingField("diff"))?;
                let diff: Diff = serde_json::from_value(raw.clone())
                    .map_err(|e| DecodeError::BadShape(format!("invalid diff: {}", e)))?;
                Ok(Op::Update { path, diff })
            }
            other => Err(DecodeError::BadShape(format!("unknown op tag {:?}", other))),
        }
    }
}

/// Character count of a string. All model offsets are character-indexed.
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte index of the `char_offset`-th character. Caller bounds-checks.
pub(crate) fn byte_index(s: &str, char_offset: usize) -> usize {
    s.char_indices()
        .nth(char_offset)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> PropertyPath {
        PropertyPath::new("p1", "content")
    }

    #[test]
    fn test_string_splice_apply_and_invert() {
        let value = PropertyValue::Str("Hello World".to_string());
        let diff = Diff::StringSplice {
            offset: 6,
            delete: String::new(),
            insert: "brave ".to_string(),
        };
        let next = diff.apply_to(&value, &path()).unwrap();
        assert_eq!(next.as_str(), Some("Hello brave World"));

        let back = diff.invert().apply_to(&next, &path()).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_string_splice_is_char_indexed() {
        let value = PropertyValue::Str("héllo".to_string());
        let diff = Diff::StringSplice {
            offset: 2,
            delete: "llo".to_string(),
            insert: "y".to_string(),
        };
        let next = diff.apply_to(&value, &path()).unwrap();
        assert_eq!(next.as_str(), Some("héy"));
    }

    #[test]
    fn test_string_splice_verifies_captured_text() {
        let value = PropertyValue::Str("Hello".to_string());
        let diff = Diff::StringSplice {
            offset: 0,
            delete: "Hullo".to_string(),
            insert: String::new(),
        };
        assert!(matches!(
            diff.apply_to(&value, &path()),
            Err(OpError::SpliceMismatch { .. })
        ));
    }

    #[test]
    fn test_string_splice_out_of_range() {
        let value = PropertyValue::Str("Hi".to_string());
        let diff = Diff::StringSplice {
            offset: 1,
            delete: "ii".to_string(),
            insert: String::new(),
        };
        assert!(matches!(
            diff.apply_to(&value, &path()),
            Err(OpError::SpliceOutOfRange { .. })
        ));
    }

    #[test]
    fn test_list_splice_apply_and_invert() {
        let value = PropertyValue::IdList(vec!["a".into(), "b".into(), "c".into()]);
        let diff = Diff::remove_at(1, "b");
        let next = diff.apply_to(&value, &path()).unwrap();
        assert_eq!(next.as_id_list(), Some(&["a".to_string(), "c".to_string()][..]));

        let back = diff.invert().apply_to(&next, &path()).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_number_delta_inverts() {
        let value = PropertyValue::Int(10);
        let diff = Diff::NumberDelta { delta: -3 };
        let next = diff.apply_to(&value, &path()).unwrap();
        assert_eq!(next.as_int(), Some(7));
        let back = diff.invert().apply_to(&next, &path()).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_op_invert_is_an_involution() {
        let op = Op::Set {
            path: path(),
            value: PropertyValue::Str("Hi".to_string()),
            original: PropertyValue::Str("Hello World".to_string()),
        };
        assert_eq!(op.invert().invert(), op);

        let op = Op::Update {
            path: path(),
            diff: Diff::insert_text(6, "brave "),
        };
        assert_eq!(op.invert().invert(), op);
    }

    #[test]
    fn test_wire_form_tags() {
        let op = Op::Update {
            path: path(),
            diff: Diff::insert_text(0, "x"),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "update");
        assert_eq!(json["diff"]["type"], "string-splice");
        assert_eq!(json["path"], serde_json::json!(["p1", "content"]));
    }
}
