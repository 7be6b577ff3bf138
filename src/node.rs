//! Immutable tree nodes. Every operation is pure: it returns a new node
//! rather than mutating one in place, matching spec.md §4.2.
//!
//! `NodeFlags` is grounded in the teacher's `src/radix/node.rs`, which uses
//! `bitflags` for exactly this kind of small per-node boolean state.

use std::sync::Arc;

use bitflags::bitflags;
use regex::Regex;
use smallvec::SmallVec;

use crate::route::Route;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        /// Set when `route` is populated. Kept alongside the `Option` so the
        /// hot walk can check a cheap bit instead of matching the option,
        /// mirroring the teacher's small bitflag optimizations.
        const LEAF = 0b0000_0001;
    }
}

/// A named parameter capture, optionally constrained by a compiled regex and
/// optionally requiring a literal suffix before the next segment delimiter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: Arc<str>,
    pub regex: Option<Arc<Regex>>,
    /// Literal bytes that must immediately follow the captured value, before
    /// the next delimiter or end of input (supports `{name}.json`-style
    /// segments from the segment grammar in spec.md §6).
    pub suffix: Box<str>,
}

impl ParamSpec {
    /// Two parameter edges can share one tree slot only if they'd accept
    /// exactly the same inputs; `Regex` has no `PartialEq`, so constraints
    /// are compared by source text.
    pub fn matches(&self, other: &ParamSpec) -> bool {
        self.suffix == other.suffix
            && match (&self.regex, &other.regex) {
                (Some(a), Some(b)) => a.as_str() == b.as_str(),
                (None, None) => true,
                _ => false,
            }
    }
}

/// A catch-all capture. May be an "ending" catch-all (the node carries its
/// own terminal route and consumes the remainder verbatim) or an "infix"
/// wildcard (the node has children forming a continuation subtree that a
/// greedy, retry-widening capture must thread through) — spec.md §4.3. Both
/// usages can coexist on the same node (spec.md §8 scenario 2).
#[derive(Debug, Clone)]
pub struct WildcardSpec {
    pub name: Arc<str>,
    pub regex: Option<Arc<Regex>>,
}

impl WildcardSpec {
    pub fn matches(&self, other: &WildcardSpec) -> bool {
        match (&self.regex, &other.regex) {
            (Some(a), Some(b)) => a.as_str() == b.as_str(),
            (None, None) => true,
            _ => false,
        }
    }
}

/// The key fragment a node contributes to the paths that pass through it.
#[derive(Debug, Clone)]
pub enum NodeKey {
    /// A run of literal bytes. Root nodes use an empty `Static("")`  — method
    /// selection is done by indexing into the tree's per-method root array
    /// rather than by string-matching a method name at a synthetic root
    /// node, an idiomatic-Rust simplification documented in DESIGN.md.
    Static(Box<str>),
    Param(ParamSpec),
    Wildcard(WildcardSpec),
}

impl NodeKey {
    /// First byte of a `Static` key, used for the linear `child_keys` scan.
    /// Only meaningful for static children.
    pub fn first_byte(&self) -> Option<u8> {
        match self {
            NodeKey::Static(s) => s.as_bytes().first().copied(),
            _ => None,
        }
    }

    pub fn as_static(&self) -> Option<&str> {
        match self {
            NodeKey::Static(s) => Some(s),
            _ => None,
        }
    }
}

/// An immutable tree node. Node graphs are shared by `Arc` across snapshots;
/// a transaction clones only the nodes on the path it mutates (spec.md §3,
/// §9).
///
/// `Clone` is implemented by hand rather than derived: every `T` the node
/// touches is behind an `Arc`, so cloning a node is always cheap and never
/// actually needs `T: Clone` — the derive macro would add that bound
/// unconditionally and force it on every caller.
#[derive(Debug)]
pub struct Node<T> {
    pub key: NodeKey,
    pub route: Option<Arc<Route<T>>>,
    /// Ordered: static children first (sorted by first byte), then the
    /// parameter child (if any), then the wildcard child (if any) —
    /// spec.md §3 invariant on sibling order and lookup priority.
    pub children: SmallVec<[Arc<Node<T>>; 4]>,
    /// Parallel to the static prefix of `children`: first byte of each
    /// static child's key, for the linear `get_edge` scan.
    pub child_keys: SmallVec<[u8; 4]>,
    pub param_child_index: Option<usize>,
    pub wildcard_child_index: Option<usize>,
    pub flags: NodeFlags,
}

impl<T> Clone for Node<T> {
    fn clone(&self) -> Self {
        Node {
            key: self.key.clone(),
            route: self.route.clone(),
            children: self.children.clone(),
            child_keys: self.child_keys.clone(),
            param_child_index: self.param_child_index,
            wildcard_child_index: self.wildcard_child_index,
            flags: self.flags,
        }
    }
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Node {
            key: NodeKey::Static(Box::from("")),
            route: None,
            children: SmallVec::new(),
            child_keys: SmallVec::new(),
            param_child_index: None,
            wildcard_child_index: None,
            flags: NodeFlags::empty(),
        }
    }
}

impl<T> Node<T> {
    pub fn new(key: NodeKey) -> Self {
        Node {
            key,
            ..Default::default()
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.flags.contains(NodeFlags::LEAF)
    }

    /// Shallow copy: same children/key/route, independent child slice so the
    /// caller can mutate children/route on the clone without touching the
    /// original still referenced by other snapshots.
    pub fn clone_shallow(&self) -> Self {
        self.clone()
    }

    /// Static-edge-only linear scan by first byte (spec.md §4.2), optimal for
    /// the small fanout typical of a route tree node.
    pub fn get_static_edge(&self, first_byte: u8) -> Option<&Arc<Node<T>>> {
        let static_len = self.static_len();
        self.child_keys[..static_len]
            .iter()
            .position(|&b| b == first_byte)
            .map(|idx| &self.children[idx])
    }

    pub fn get_static_edge_index(&self, first_byte: u8) -> Option<usize> {
        let static_len = self.static_len();
        self.child_keys[..static_len]
            .iter()
            .position(|&b| b == first_byte)
    }

    pub fn param_child(&self) -> Option<&Arc<Node<T>>> {
        self.param_child_index.map(|i| &self.children[i])
    }

    pub fn wildcard_child(&self) -> Option<&Arc<Node<T>>> {
        self.wildcard_child_index.map(|i| &self.children[i])
    }

    /// Number of static children at the front of `children` (before the
    /// optional parameter/wildcard edges).
    pub fn static_len(&self) -> usize {
        self.param_child_index
            .or(self.wildcard_child_index)
            .unwrap_or(self.children.len())
    }

    /// Insert a brand-new static child, keeping `children`/`child_keys`
    /// sorted by first byte ahead of the param/wildcard edges, and shifting
    /// their recorded indices.
    pub fn add_static_edge(&mut self, child: Arc<Node<T>>) {
        let byte = child.key.first_byte().expect("static child must have a key");
        let static_len = self.static_len();
        let pos = self.child_keys[..static_len]
            .iter()
            .position(|&b| b > byte)
            .unwrap_or(static_len);
        self.children.insert(pos, child);
        self.child_keys.insert(pos, byte);
        if let Some(idx) = self.param_child_index.as_mut() {
            *idx += 1;
        }
        if let Some(idx) = self.wildcard_child_index.as_mut() {
            *idx += 1;
        }
    }

    pub fn replace_static_edge(&mut self, index: usize, child: Arc<Node<T>>) {
        self.children[index] = child;
    }

    pub fn set_param_edge(&mut self, child: Arc<Node<T>>) {
        debug_assert!(self.param_child_index.is_none());
        let pos = self.static_len();
        self.children.insert(pos, child);
        self.param_child_index = Some(pos);
        if let Some(idx) = self.wildcard_child_index.as_mut() {
            *idx += 1;
        }
    }

    pub fn replace_param_edge(&mut self, child: Arc<Node<T>>) {
        let idx = self.param_child_index.expect("no param edge to replace");
        self.children[idx] = child;
    }

    pub fn set_wildcard_edge(&mut self, child: Arc<Node<T>>) {
        debug_assert!(self.wildcard_child_index.is_none());
        self.children.push(child);
        self.wildcard_child_index = Some(self.children.len() - 1);
    }

    pub fn replace_wildcard_edge(&mut self, child: Arc<Node<T>>) {
        let idx = self.wildcard_child_index.expect("no wildcard edge to replace");
        self.children[idx] = child;
    }

    /// Remove the child at `index`, fixing up `child_keys` and the
    /// param/wildcard indices.
    pub fn remove_child(&mut self, index: usize) {
        self.children.remove(index);
        let static_len = self.static_len();
        if index < static_len {
            self.child_keys.remove(index);
        }
        if let Some(p) = self.param_child_index
            && p == index
        {
            self.param_child_index = None;
        } else if let Some(p) = self.param_child_index.as_mut()
            && *p > index
        {
            *p -= 1;
        }
        if let Some(w) = self.wildcard_child_index
            && w == index
        {
            self.wildcard_child_index = None;
        } else if let Some(w) = self.wildcard_child_index.as_mut()
            && *w > index
        {
            *w -= 1;
        }
    }
}

/// Longest common byte prefix length of two strings, snapped down to the
/// nearest UTF-8 char boundary so a split never produces invalid `str`s.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    let raw = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .take_while(|(x, y)| x == y)
        .count();
    let mut len = raw;
    while len > 0 && !a.is_char_boundary(len) {
        len -= 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_prefix_len_when_strings_diverge_mid_char_then_snaps_to_char_boundary() {
        // "café" and "cafz" share the byte 'c','a','f' (3 bytes), then the
        // multi-byte 'é' (2 bytes in utf-8) diverges from ascii 'z'.
        let a = "café";
        let b = "cafz";
        let len = common_prefix_len(a, b);
        assert_eq!(len, 3);
        assert!(a.is_char_boundary(len));
    }

    #[test]
    fn common_prefix_len_when_identical_then_returns_full_length() {
        assert_eq!(common_prefix_len("/users", "/users"), "/users".len());
    }

    #[test]
    fn common_prefix_len_when_no_shared_prefix_then_returns_zero() {
        assert_eq!(common_prefix_len("abc", "xyz"), 0);
    }

    #[test]
    fn param_spec_matches_when_suffix_and_regex_source_equal_then_true() {
        let a = ParamSpec {
            name: Arc::from("id"),
            regex: None,
            suffix: Box::from(".json"),
        };
        let b = ParamSpec {
            name: Arc::from("other_name"),
            regex: None,
            suffix: Box::from(".json"),
        };
        assert!(a.matches(&b));
    }

    #[test]
    fn param_spec_matches_when_suffixes_differ_then_false() {
        let a = ParamSpec {
            name: Arc::from("id"),
            regex: None,
            suffix: Box::from(".json"),
        };
        let b = ParamSpec {
            name: Arc::from("id"),
            regex: None,
            suffix: Box::from(".xml"),
        };
        assert!(!a.matches(&b));
    }

    #[test]
    fn param_spec_matches_when_one_has_regex_and_other_does_not_then_false() {
        let a = ParamSpec {
            name: Arc::from("id"),
            regex: Some(Arc::new(Regex::new("[0-9]+").unwrap())),
            suffix: Box::from(""),
        };
        let b = ParamSpec {
            name: Arc::from("id"),
            regex: None,
            suffix: Box::from(""),
        };
        assert!(!a.matches(&b));
    }

    #[test]
    fn wildcard_spec_matches_when_regex_source_equal_then_true() {
        let a = WildcardSpec {
            name: Arc::from("args"),
            regex: Some(Arc::new(Regex::new("[a-z/]+").unwrap())),
        };
        let b = WildcardSpec {
            name: Arc::from("rest"),
            regex: Some(Arc::new(Regex::new("[a-z/]+").unwrap())),
        };
        assert!(a.matches(&b));
    }

    #[test]
    fn node_clone_does_not_require_handler_to_implement_clone() {
        struct NotClone;
        let node: Node<NotClone> = Node::default();
        let cloned = node.clone_shallow();
        assert!(cloned.children.is_empty());
    }
}
