//! The terminal record attached to a leaf node.

use std::collections::HashMap;
use std::sync::Arc;

/// Describes one parameter captured somewhere along a route's matching
/// path, in registration order.
///
/// spec.md's `Route.params` entries carry a byte `end` offset used to jump
/// within a node's raw key. This crate represents a node's key as a typed
/// [`crate::node::NodeKey`] rather than a flat byte buffer with embedded
/// sentinel characters, so the "jump target" is structural (the parameter's
/// position in the tree) rather than a numeric offset — see DESIGN.md.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub name: Arc<str>,
    pub catch_all: bool,
}

/// Ambient per-route metadata, trimmed from the teacher's
/// `router::options::RouteOptions` to the fields this crate carries on a
/// caller's behalf. Neither `priority` nor `meta` is read by the matching or
/// conflict-resolution logic in `txn.rs`/`lookup.rs` — the node model
/// already gives each static/parameter/wildcard edge a single, unambiguous
/// slot per node (a colliding parameter/wildcard spec is rejected outright
/// as `RouteConflict` rather than resolved by priority), so there is no tie
/// for a numeric priority to break. Both fields are opaque payload a caller
/// can round-trip through `route_options`, the same role `meta` already
/// plays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteOptions {
    pub priority: i32,
    pub meta: HashMap<String, String>,
}

/// An immutable, fully registered route. `handler` is never interpreted by
/// the core — it is stored and returned verbatim, mirroring
/// `matchit::Router<T>` in the example pack.
#[derive(Debug, Clone)]
pub struct Route<T> {
    pub pattern: Box<str>,
    pub host_split: usize,
    pub params: Vec<ParamDescriptor>,
    pub handler: T,
    pub options: RouteOptions,
}

impl<T> Route<T> {
    pub fn path(&self) -> &str {
        &self.pattern[self.host_split..]
    }

    pub fn host(&self) -> Option<&str> {
        if self.host_split == 0 {
            None
        } else {
            Some(&self.pattern[..self.host_split])
        }
    }
}
