//! # Substance Editor
//!
//! Transactional mutation layer over the document model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: schema + store + invertible ops      │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: Document lifecycle + transactions   │
//! │  - shadow stage buffering ops atomically    │
//! │  - DocumentChange + undo/redo history       │
//! │  - event proxies (by path, by type)         │
//! │  - snapshot load/save                       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Atomicity against observers**: no event fires until a transaction
//!    commits; cancel leaves nothing observable.
//! 2. **Inverses are captured, not derived**: undo replays inverses the
//!    ops recorded at apply time, never consulting the current store.
//! 3. **Result-based control flow**: a transformation returns commit or
//!    cancel; errors cancel and propagate. No exceptions for flow control.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use substance_editor::{ChangeInfo, Document, StateMap, TxOutcome};
//!
//! let mut doc = Document::new(schema);
//! doc.transaction(StateMap::new(), ChangeInfo::default(), |tx| {
//!     let id = tx.new_node_id();
//!     tx.create(Node::new(id, "paragraph").with("content", "Hello"))?;
//!     Ok(TxOutcome::Commit(StateMap::new()))
//! })?;
//! doc.undo()?;
//! ```

mod change;
mod document;
mod errors;
mod history;
mod proxies;
mod stage;

pub use change::{ChangeInfo, DocumentChange, StateMap, STATE_SELECTION};
pub use document::{Document, DocumentConfig};
pub use errors::{EditorError, EditorResult};
pub use history::History;
pub use proxies::{ChangeProxy, ListenerId, PathEventProxy, ProxyListener, TypeEventProxy};
pub use stage::{Stage, Transaction, TxOutcome};
