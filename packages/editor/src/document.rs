//! # Document
//!
//! The editing facade. A document owns its live store, its shadow stage,
//! its history and its event registrations; nothing about it is process
//! global.
//!
//! ## Mutation paths
//!
//! - **Transactions** (`transaction`): the transformation receives the
//!   staged document, mutates it atomically, and either commits (the
//!   buffered ops become a [`DocumentChange`], replayed onto the live
//!   store and recorded in history) or cancels (the stage reverts, nothing
//!   is observable). Observers never see a partial transaction: no event
//!   fires until commit.
//! - **Direct mutation** (`create`, `set`, ...): applied to the live store
//!   and mirrored into the stage so both stay byte-identical. Direct
//!   mutations emit `document:changed` but are not recorded in history;
//!   set [`DocumentConfig::force_transactions`] to forbid them entirely.
//!
//! ## Events
//!
//! `transaction:started` fires when a stage activates; after a change is
//! applied the document invokes each proxy (path, then type), then emits a
//! single `document:changed`.

use crate::change::{ChangeInfo, DocumentChange, StateMap};
use crate::errors::{EditorError, EditorResult};
use crate::history::History;
use crate::proxies::{ChangeProxy, PathEventProxy, TypeEventProxy};
use crate::stage::{Stage, Transaction, TxOutcome};
use serde_json::{json, Value};
use std::sync::Arc;
use substance_model::{
    Annotation, Container, ContainerAnnotation, Diff, Node, NodeIdGenerator, Op, PropertyPath,
    PropertyValue, Schema, Selection, Store,
};
use tracing::{debug, warn};

/// Per-document policy knobs.
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    /// Forbid mutations outside a transaction.
    pub force_transactions: bool,

    /// Undo depth; `0` is unlimited.
    pub max_undo_levels: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            force_transactions: false,
            max_undo_levels: 100,
        }
    }
}

type ChangeListener = Box<dyn FnMut(&DocumentChange, &ChangeInfo)>;
type TransactionListener = Box<dyn FnMut()>;

pub struct Document {
    schema: Arc<Schema>,
    store: Store,
    stage: Stage,
    history: History,
    path_proxy: PathEventProxy,
    type_proxy: TypeEventProxy,
    change_listeners: Vec<(ListenerIdSeq, ChangeListener)>,
    tx_listeners: Vec<(ListenerIdSeq, TransactionListener)>,
    next_listener: u64,
    ids: NodeIdGenerator,
    config: DocumentConfig,
}

type ListenerIdSeq = u64;

impl Document {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_config(schema, DocumentConfig::default())
    }

    pub fn with_config(schema: Arc<Schema>, config: DocumentConfig) -> Self {
        let store = Store::new(schema.clone());
        let ids = NodeIdGenerator::new(schema.name());
        Self {
            stage: Stage::new(store.clone()),
            history: History::with_max_levels(config.max_undo_levels),
            path_proxy: PathEventProxy::new(),
            type_proxy: TypeEventProxy::new(),
            change_listeners: Vec::new(),
            tx_listeners: Vec::new(),
            next_listener: 0,
            schema,
            store,
            ids,
            config,
        }
    }

    // ---- reads -----------------------------------------------------------

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Shadow store; byte-identical to the live store outside a
    /// transaction.
    pub fn stage_store(&self) -> &Store {
        self.stage.store()
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.store.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.store.contains(id)
    }

    pub fn text_at(&self, path: &PropertyPath) -> Option<&str> {
        self.store.text_at(path).ok()
    }

    pub fn container(&self, id: &str) -> EditorResult<Container<'_>> {
        Ok(self.store.container(id)?)
    }

    pub fn annotations_in(
        &self,
        path: &PropertyPath,
        start: usize,
        end: usize,
        node_type: Option<&str>,
    ) -> Vec<Annotation<'_>> {
        self.store.annotations_in(path, start, end, node_type)
    }

    pub fn annotations_for_selection(
        &self,
        sel: &Selection,
        node_type: Option<&str>,
    ) -> Vec<ContainerAnnotation<'_>> {
        self.store.annotations_for_selection(sel, node_type)
    }

    /// Fresh document-scoped node id.
    pub fn new_node_id(&mut self) -> String {
        self.ids.next_id()
    }

    // ---- events ----------------------------------------------------------

    /// Subscribe to `document:changed`. Fires once per applied change,
    /// after all proxies.
    pub fn on_document_changed(&mut self, listener: ChangeListener) -> ListenerIdSeq {
        self.next_listener += 1;
        self.change_listeners.push((self.next_listener, listener));
        self.next_listener
    }

    pub fn off_document_changed(&mut self, id: ListenerIdSeq) {
        self.change_listeners.retain(|(lid, _)| *lid != id);
    }

    /// Subscribe to `transaction:started`.
    pub fn on_transaction_started(&mut self, listener: TransactionListener) -> ListenerIdSeq {
        self.next_listener += 1;
        self.tx_listeners.push((self.next_listener, listener));
        self.next_listener
    }

    pub fn off_transaction_started(&mut self, id: ListenerIdSeq) {
        self.tx_listeners.retain(|(lid, _)| *lid != id);
    }

    /// By-path proxy registration surface.
    pub fn path_proxy(&mut self) -> &mut PathEventProxy {
        &mut self.path_proxy
    }

    /// By-type proxy registration surface.
    pub fn type_proxy(&mut self) -> &mut TypeEventProxy {
        &mut self.type_proxy
    }

    // ---- transactions ----------------------------------------------------

    /// Run `transform` against the staged document. Commit wraps the
    /// buffered ops in a [`DocumentChange`], replays them on the live
    /// store, fans out events, and records history. Cancel (or an error
    /// from the transformation) reverts the stage and leaves the document
    /// untouched.
    ///
    /// An empty commit yields a zero-op change that is not recorded and
    /// emits nothing.
    pub fn transaction<F>(
        &mut self,
        before: StateMap,
        info: ChangeInfo,
        transform: F,
    ) -> EditorResult<Option<DocumentChange>>
    where
        F: FnOnce(&mut Transaction<'_>) -> EditorResult<TxOutcome>,
    {
        self.begin_transaction(before)?;

        let outcome = {
            let mut tx = Transaction::new(&mut self.stage, &mut self.ids);
            transform(&mut tx)
        };

        match outcome {
            Err(e) => {
                self.stage.cancel();
                Err(e)
            }
            Ok(TxOutcome::Cancel) => {
                self.stage.cancel();
                Ok(None)
            }
            Ok(TxOutcome::Commit(returned)) => self.commit_transaction(returned, info),
        }
    }

    /// Imperative counterpart of [`transaction`](Self::transaction): start
    /// the stage and emit `transaction:started`. Fails with
    /// `NestedTransaction` while another transaction is active; the outer
    /// transaction is left intact.
    pub fn begin_transaction(&mut self, before: StateMap) -> EditorResult<()> {
        self.stage.start(before)?;
        for (_, listener) in self.tx_listeners.iter_mut() {
            listener();
        }
        Ok(())
    }

    /// Commit the active transaction. The buffered ops become a
    /// [`DocumentChange`] replayed onto the live store (the stage already
    /// sits at the new state and is not reset).
    pub fn commit_transaction(
        &mut self,
        after: StateMap,
        info: ChangeInfo,
    ) -> EditorResult<Option<DocumentChange>> {
        if !self.stage.is_active() {
            return Err(EditorError::NoActiveTransaction);
        }
        let (ops, before, after) = self.stage.commit(after);
        let change = DocumentChange::new(ops, before, after, info);
        if change.is_empty() {
            debug!("empty transaction commit; nothing recorded");
            return Ok(Some(change));
        }
        for op in &change.ops {
            self.store.apply(op)?;
        }
        self.dispatch(&change);
        self.history.record(change.clone());
        Ok(Some(change))
    }

    /// Discard the active transaction, reverting the stage. A no-op when
    /// idle.
    pub fn cancel_transaction(&mut self) {
        if self.stage.is_active() {
            self.stage.cancel();
        }
    }

    pub fn is_transacting(&self) -> bool {
        self.stage.is_active()
    }

    // ---- direct mutation (legacy affordance) -----------------------------

    pub fn create(&mut self, node: Node) -> EditorResult<Node> {
        let op = self.direct(|store| store.create(node))?;
        let Op::Create { node } = &op else {
            unreachable!("create produces a create op");
        };
        Ok(node.clone())
    }

    pub fn delete(&mut self, id: &str) -> EditorResult<Op> {
        self.direct(|store| store.delete(id))
    }

    pub fn set(&mut self, path: &PropertyPath, value: PropertyValue) -> EditorResult<Op> {
        self.direct(|store| store.set(path, value))
    }

    pub fn update(&mut self, path: &PropertyPath, diff: Diff) -> EditorResult<Op> {
        self.direct(|store| store.update(path, diff))
    }

    pub fn splice_text(
        &mut self,
        path: &PropertyPath,
        offset: usize,
        remove_len: usize,
        insert: &str,
    ) -> EditorResult<Op> {
        self.direct(|store| store.splice_text(path, offset, remove_len, insert))
    }

    pub fn show(
        &mut self,
        container_id: &str,
        node_id: &str,
        pos: Option<usize>,
    ) -> EditorResult<Op> {
        self.direct(|store| store.show(container_id, node_id, pos))
    }

    pub fn hide(&mut self, container_id: &str, node_id: &str) -> EditorResult<Option<Op>> {
        if self.stage.is_active() {
            return Ok(self.stage.hide(container_id, node_id)?);
        }
        if self.config.force_transactions {
            return Err(EditorError::ForcedTransactions);
        }
        let Some(op) = self.store.hide(container_id, node_id)? else {
            return Ok(None);
        };
        self.stage.mirror(&op)?;
        self.emit_direct(&op);
        Ok(Some(op))
    }

    /// Route one capturing mutation. During an imperative transaction the
    /// mutation is buffered on the stage; otherwise it applies to the live
    /// store, mirrors into the stage, and emits `document:changed` without
    /// recording history.
    fn direct(
        &mut self,
        apply: impl FnOnce(&mut Store) -> substance_model::OpResult<Op>,
    ) -> EditorResult<Op> {
        if self.stage.is_active() {
            return Ok(self.stage.apply_recorded(apply)?);
        }
        if self.config.force_transactions {
            return Err(EditorError::ForcedTransactions);
        }
        let op = apply(&mut self.store)?;
        self.stage.mirror(&op)?;
        self.emit_direct(&op);
        Ok(op)
    }

    fn emit_direct(&mut self, op: &Op) {
        let change = DocumentChange::new(
            vec![op.clone()],
            StateMap::new(),
            StateMap::new(),
            ChangeInfo::default(),
        );
        self.dispatch(&change);
    }

    // ---- history ---------------------------------------------------------

    /// Undo the most recent committed change. `Ok(false)` when history is
    /// exhausted.
    pub fn undo(&mut self) -> EditorResult<bool> {
        let Some(change) = self.history.pop_done() else {
            warn!("no change to undo");
            return Ok(false);
        };
        let inverted = change.invert();
        for op in &inverted.ops {
            self.store.apply(op)?;
            self.stage.mirror(op)?;
        }
        self.dispatch(&inverted);
        self.history.push_undone(change);
        Ok(true)
    }

    /// Redo the most recently undone change. `Ok(false)` when nothing is
    /// undone.
    pub fn redo(&mut self) -> EditorResult<bool> {
        let Some(change) = self.history.pop_undone() else {
            warn!("no change to redo");
            return Ok(false);
        };
        let replayed = change.replayed();
        for op in &replayed.ops {
            self.store.apply(op)?;
            self.stage.mirror(op)?;
        }
        self.dispatch(&replayed);
        self.history.push_done(change);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    // ---- snapshots -------------------------------------------------------

    /// Serialize the document: `{"schema": {name, version}, "nodes": [...]}`.
    pub fn to_snapshot(&self) -> Value {
        json!({
            "schema": {
                "name": self.schema.name(),
                "version": self.schema.version(),
            },
            "nodes": self.store.nodes().map(Node::to_json).collect::<Vec<_>>(),
        })
    }

    /// Load a snapshot inside an implicit transaction that is not recorded
    /// in history. Nodes are created in dependency phases (plain nodes,
    /// containers, annotations, container annotations) so reference
    /// validation sees targets first.
    pub fn from_snapshot(schema: Arc<Schema>, snapshot: &Value) -> EditorResult<Document> {
        let header = snapshot
            .get("schema")
            .and_then(Value::as_object)
            .ok_or_else(|| EditorError::Snapshot("missing schema header".into()))?;
        let name = header.get("name").and_then(Value::as_str).unwrap_or("");
        if name != schema.name() {
            return Err(EditorError::Snapshot(format!(
                "schema mismatch: snapshot is '{}', document is '{}'",
                name,
                schema.name()
            )));
        }

        let raw_nodes = snapshot
            .get("nodes")
            .and_then(Value::as_array)
            .ok_or_else(|| EditorError::Snapshot("missing nodes array".into()))?;

        let mut decoded = Vec::with_capacity(raw_nodes.len());
        for raw in raw_nodes {
            decoded.push(Node::from_json(&schema, raw)?);
        }

        let phase = |node: &Node| -> u8 {
            let ty = node.node_type();
            if schema.is_container_annotation_type(ty) {
                3
            } else if schema.is_annotation_type(ty) {
                2
            } else if schema.is_container_type(ty) {
                1
            } else {
                0
            }
        };
        decoded.sort_by_key(phase);

        let mut doc = Document::new(schema);
        for node in decoded {
            let op = doc.store.create(node)?;
            doc.stage.mirror(&op)?;
        }
        Ok(doc)
    }

    // ---- teardown --------------------------------------------------------

    /// Release listeners and drop both stores. The document is unusable
    /// afterwards except for re-loading.
    pub fn dispose(&mut self) {
        self.change_listeners.clear();
        self.tx_listeners.clear();
        self.path_proxy.clear();
        self.type_proxy.clear();
        self.history.clear();
        self.store.clear();
        self.stage = Stage::new(self.store.clone());
    }

    // ---- internals -------------------------------------------------------

    /// Proxies in registration order, then the single `document:changed`.
    fn dispatch(&mut self, change: &DocumentChange) {
        self.path_proxy.on_change(change, &change.info, &self.store);
        self.type_proxy.on_change(change, &change.info, &self.store);
        for (_, listener) in self.change_listeners.iter_mut() {
            listener(change, &change.info);
        }
    }
}
