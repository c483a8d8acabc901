//! # Event Proxies
//!
//! Interest-filtered change dispatch. Without proxies every keystroke would
//! fan out to every node listener; a proxy maintains a `key → listeners`
//! map and dispatches in O(1) per affected key.
//!
//! Two proxies ship with the document:
//! - [`PathEventProxy`] — listeners subscribe to a `(node id, property)`
//!   path and hear only ops touching that path.
//! - [`TypeEventProxy`] — listeners subscribe to a node type (matching
//!   subtypes) and hear changes affecting nodes of that type.
//!
//! A listener error is logged and isolated; it never blocks other
//! listeners or the global `document:changed` emission. Listeners run in
//! registration order.

use crate::change::{ChangeInfo, DocumentChange};
use std::collections::HashMap;
use substance_model::{Op, PropertyPath, Store};
use tracing::error;

/// Handle for unsubscribing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Proxy listener callback. Returning `Err` is logged and isolated.
pub type ProxyListener =
    Box<dyn FnMut(&DocumentChange, &ChangeInfo) -> Result<(), Box<dyn std::error::Error>>>;

/// A change filter invoked by the document after every applied change,
/// before the global `document:changed` emission.
pub trait ChangeProxy {
    fn on_change(&mut self, change: &DocumentChange, info: &ChangeInfo, store: &Store);
}

fn invoke(listeners: &mut [(ListenerId, ProxyListener)], change: &DocumentChange, info: &ChangeInfo) {
    for (id, listener) in listeners.iter_mut() {
        if let Err(e) = listener(change, info) {
            error!(listener = id.0, error = %e, "change listener failed");
        }
    }
}

/// By-path proxy: `path → set of listeners`.
#[derive(Default)]
pub struct PathEventProxy {
    listeners: HashMap<PropertyPath, Vec<(ListenerId, ProxyListener)>>,
    next_id: u64,
}

impl PathEventProxy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to changes touching `path`.
    pub fn subscribe(&mut self, path: PropertyPath, listener: ProxyListener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.entry(path).or_default().push((id, listener));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) {
        for bucket in self.listeners.values_mut() {
            bucket.retain(|(lid, _)| *lid != id);
        }
        self.listeners.retain(|_, bucket| !bucket.is_empty());
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl ChangeProxy for PathEventProxy {
    fn on_change(&mut self, change: &DocumentChange, info: &ChangeInfo, _store: &Store) {
        for path in change.touched_paths() {
            if let Some(bucket) = self.listeners.get_mut(&path) {
                invoke(bucket, change, info);
            }
        }
    }
}

/// By-type proxy: `node type → set of listeners`. Subscriptions match
/// subtypes of the subscribed type.
#[derive(Default)]
pub struct TypeEventProxy {
    listeners: HashMap<String, Vec<(ListenerId, ProxyListener)>>,
    next_id: u64,
}

impl TypeEventProxy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, node_type: impl Into<String>, listener: ProxyListener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners
            .entry(node_type.into())
            .or_default()
            .push((id, listener));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) {
        for bucket in self.listeners.values_mut() {
            bucket.retain(|(lid, _)| *lid != id);
        }
        self.listeners.retain(|_, bucket| !bucket.is_empty());
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Concrete types affected by a change. Deleted nodes resolve from the
    /// captured record, everything else from the live store.
    fn affected_types(change: &DocumentChange, store: &Store) -> Vec<String> {
        let mut types = Vec::new();
        for op in &change.ops {
            let ty = match op {
                Op::Create { node } | Op::Delete { node } => Some(node.node_type().to_string()),
                Op::Set { path, .. } | Op::Update { path, .. } => store
                    .get(&path.node_id)
                    .map(|node| node.node_type().to_string()),
            };
            if let Some(ty) = ty {
                if !types.contains(&ty) {
                    types.push(ty);
                }
            }
        }
        types
    }
}

impl ChangeProxy for TypeEventProxy {
    fn on_change(&mut self, change: &DocumentChange, info: &ChangeInfo, store: &Store) {
        let affected = Self::affected_types(change, store);
        let schema = store.schema().clone();
        for (subscribed, bucket) in self.listeners.iter_mut() {
            if affected
                .iter()
                .any(|ty| schema.is_instance_of(ty, subscribed))
            {
                invoke(bucket, change, info);
            }
        }
    }
}
