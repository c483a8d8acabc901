//! # Transaction Stage
//!
//! A shadow document sharing the schema and carrying a full clone of the
//! live store's data. While a transaction is active the stage buffers every
//! recorded op; commit drains the buffer into a change for the live store
//! to replay, cancel reverts the shadow by applying inverses in reverse
//! order. Outside a transaction the document mirrors its direct mutations
//! into the stage so both stores stay byte-identical.
//!
//! The stage lock is exclusive: starting a transaction while one is active
//! fails with `NestedTransaction` and leaves the outer transaction intact.

use crate::change::StateMap;
use crate::errors::{EditorError, EditorResult};
use substance_model::{
    Annotation, Container, Diff, Node, NodeIdGenerator, Op, OpResult, PropertyPath, PropertyValue,
    Store,
};
use tracing::error;

#[derive(Debug, Clone)]
pub struct Stage {
    store: Store,
    ops: Vec<Op>,
    active: bool,
    before: StateMap,
}

impl Stage {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            ops: Vec::new(),
            active: false,
            before: StateMap::new(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn start(&mut self, before: StateMap) -> EditorResult<()> {
        if self.active {
            return Err(EditorError::NestedTransaction);
        }
        self.active = true;
        self.before = before;
        Ok(())
    }

    /// Revert the shadow store and discard the buffer.
    pub(crate) fn cancel(&mut self) {
        for op in self.ops.drain(..).rev() {
            if let Err(e) = self.store.apply(&op.invert()) {
                // Reverting an applied op cannot fail unless the stage was
                // corrupted externally.
                error!(error = %e, "failed to revert staged op");
            }
        }
        self.active = false;
        self.before.clear();
    }

    /// Drain the buffer for commit. The after-state merges only keys
    /// present in the before-state; unknown keys from the transformation
    /// are dropped, missing ones carry the before value forward.
    pub(crate) fn commit(&mut self, returned: StateMap) -> (Vec<Op>, StateMap, StateMap) {
        let before = std::mem::take(&mut self.before);
        let after = before
            .iter()
            .map(|(key, fallback)| {
                let value = returned.get(key).cloned().unwrap_or_else(|| fallback.clone());
                (key.clone(), value)
            })
            .collect();
        self.active = false;
        (std::mem::take(&mut self.ops), before, after)
    }

    /// Mirror an op already applied to the live store (direct mutation
    /// outside a transaction, undo/redo replays).
    pub(crate) fn mirror(&mut self, op: &Op) -> OpResult<()> {
        self.store.apply(op)
    }

    fn record(&mut self, op: Op) -> Op {
        self.ops.push(op.clone());
        op
    }

    /// Run a capturing mutator against the shadow store and buffer the op.
    pub(crate) fn apply_recorded(
        &mut self,
        mutate: impl FnOnce(&mut Store) -> OpResult<Op>,
    ) -> OpResult<Op> {
        let op = mutate(&mut self.store)?;
        Ok(self.record(op))
    }

    pub(crate) fn create(&mut self, node: Node) -> OpResult<Node> {
        let op = self.store.create(node)?;
        let Op::Create { node } = self.record(op) else {
            unreachable!("create records a create op");
        };
        Ok(node)
    }

    pub(crate) fn delete(&mut self, id: &str) -> OpResult<Op> {
        let op = self.store.delete(id)?;
        Ok(self.record(op))
    }

    pub(crate) fn set(&mut self, path: &PropertyPath, value: PropertyValue) -> OpResult<Op> {
        let op = self.store.set(path, value)?;
        Ok(self.record(op))
    }

    pub(crate) fn update(&mut self, path: &PropertyPath, diff: Diff) -> OpResult<Op> {
        let op = self.store.update(path, diff)?;
        Ok(self.record(op))
    }

    pub(crate) fn splice_text(
        &mut self,
        path: &PropertyPath,
        offset: usize,
        remove_len: usize,
        insert: &str,
    ) -> OpResult<Op> {
        let op = self.store.splice_text(path, offset, remove_len, insert)?;
        Ok(self.record(op))
    }

    pub(crate) fn show(
        &mut self,
        container_id: &str,
        node_id: &str,
        pos: Option<usize>,
    ) -> OpResult<Op> {
        let op = self.store.show(container_id, node_id, pos)?;
        Ok(self.record(op))
    }

    pub(crate) fn hide(&mut self, container_id: &str, node_id: &str) -> OpResult<Option<Op>> {
        match self.store.hide(container_id, node_id)? {
            Some(op) => Ok(Some(self.record(op))),
            None => Ok(None),
        }
    }
}

/// What a transformation asks the document to do with the staged ops.
#[derive(Debug, Clone)]
pub enum TxOutcome {
    /// Commit, with the transformation's after-state.
    Commit(StateMap),
    /// Discard the staged ops.
    Cancel,
}

/// Handle a transformation receives: the staged document, mutable. All
/// reads see the in-progress state; all mutations are buffered for commit.
pub struct Transaction<'a> {
    stage: &'a mut Stage,
    ids: &'a mut NodeIdGenerator,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(stage: &'a mut Stage, ids: &'a mut NodeIdGenerator) -> Self {
        Self { stage, ids }
    }

    /// Fresh document-scoped node id.
    pub fn new_node_id(&mut self) -> String {
        self.ids.next_id()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.stage.store().get(id)
    }

    pub fn text_at(&self, path: &PropertyPath) -> OpResult<&str> {
        self.stage.store().text_at(path)
    }

    pub fn container(&self, id: &str) -> OpResult<Container<'_>> {
        self.stage.store().container(id)
    }

    pub fn annotations_in(
        &self,
        path: &PropertyPath,
        start: usize,
        end: usize,
        node_type: Option<&str>,
    ) -> Vec<Annotation<'_>> {
        self.stage.store().annotations_in(path, start, end, node_type)
    }

    pub fn create(&mut self, node: Node) -> OpResult<Node> {
        self.stage.create(node)
    }

    pub fn delete(&mut self, id: &str) -> OpResult<Op> {
        self.stage.delete(id)
    }

    pub fn set(&mut self, path: &PropertyPath, value: PropertyValue) -> OpResult<Op> {
        self.stage.set(path, value)
    }

    pub fn update(&mut self, path: &PropertyPath, diff: Diff) -> OpResult<Op> {
        self.stage.update(path, diff)
    }

    pub fn splice_text(
        &mut self,
        path: &PropertyPath,
        offset: usize,
        remove_len: usize,
        insert: &str,
    ) -> OpResult<Op> {
        self.stage.splice_text(path, offset, remove_len, insert)
    }

    pub fn show(&mut self, container_id: &str, node_id: &str, pos: Option<usize>) -> OpResult<Op> {
        self.stage.show(container_id, node_id, pos)
    }

    pub fn hide(&mut self, container_id: &str, node_id: &str) -> OpResult<Option<Op>> {
        self.stage.hide(container_id, node_id)
    }
}
