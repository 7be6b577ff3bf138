//! The transactional writer: a single-writer, copy-on-write view over a
//! [`Tree`]'s method roots. Every mutation clones only the nodes on the
//! path it touches; nothing is visible to readers until [`Txn::commit`]
//! (spec.md §4.4, §9).

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::MutexGuard;

use crate::error::{RouterError, RouterResult};
use crate::method::{HttpMethod, METHOD_COUNT};
use crate::node::{Node, NodeFlags, NodeKey, common_prefix_len};
use crate::pattern::{PatternPart, parse_pattern};
use crate::route::{Route, RouteOptions};
use crate::tree::{Tree, collect_patterns, count_routes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Open,
    Committed,
    Aborted,
}

enum EdgeKind {
    Param,
    Wildcard,
}

/// A transaction in progress. Holds the tree's write mutex for its entire
/// lifetime, so at most one `Txn` per tree exists at a time — the
/// `ConcurrentAccess` generation check in [`Tree::publish`] is a sentinel
/// against misuse, not a contention path.
pub struct Txn<'a, T> {
    tree: &'a Tree<T>,
    _write_guard: MutexGuard<'a, ()>,
    roots: [Arc<Node<T>>; METHOD_COUNT],
    base_generation: u64,
    clone_cache: LruCache<usize, ()>,
    size_delta: i64,
    state: TxnState,
}

impl<'a, T> Txn<'a, T> {
    pub(crate) fn new(tree: &'a Tree<T>, guard: MutexGuard<'a, ()>) -> Self {
        let snapshot = tree.load_roots();
        let capacity = NonZeroUsize::new(tree.clone_cache_capacity())
            .expect("RouterOptions::build rejects a zero clone_cache_capacity");
        Txn {
            tree,
            _write_guard: guard,
            roots: snapshot.methods.clone(),
            base_generation: tree.generation(),
            clone_cache: LruCache::new(capacity),
            size_delta: 0,
            state: TxnState::Open,
        }
    }

    fn ensure_open(&self) -> RouterResult<()> {
        match self.state {
            TxnState::Open => Ok(()),
            TxnState::Committed => Err(RouterError::ReadOnlyTxn),
            TxnState::Aborted => Err(RouterError::SettledTxn),
        }
    }

    /// Memoizes that `original` was cloned during this transaction. Current
    /// single-route mutation recursion visits each node at most once, so
    /// this mainly bounds a future batched-mutation API; kept as a real
    /// (if lightly exercised) `lru`-backed cache rather than removed,
    /// per DESIGN.md.
    fn record_clone(&mut self, original: &Arc<Node<T>>) {
        let key = Arc::as_ptr(original) as usize;
        self.clone_cache.put(key, ());
    }

    /// Number of distinct nodes cloned so far in this transaction.
    pub fn clone_cache_len(&self) -> usize {
        self.clone_cache.len()
    }

    fn combined_parts(pattern: &str) -> RouterResult<(Vec<PatternPart>, crate::pattern::ParsedPattern)> {
        let parsed = parse_pattern(pattern)?;
        let mut parts = Vec::with_capacity(parsed.host_parts.len() + parsed.path_parts.len());
        parts.extend(parsed.host_parts.iter().cloned());
        parts.extend(parsed.path_parts.iter().cloned());
        Ok((parts, parsed))
    }

    pub fn insert(
        &mut self,
        method: HttpMethod,
        pattern: &str,
        handler: T,
        options: RouteOptions,
    ) -> RouterResult<()> {
        self.ensure_open()?;
        let (parts, parsed) = Self::combined_parts(pattern)?;
        if parsed.params.len() > self.tree.max_params() {
            return Err(RouterError::InvalidRoute {
                pattern: pattern.to_string(),
                reason: crate::error::InvalidRouteReason::TooManyParams,
            });
        }
        let route = Arc::new(Route {
            pattern: Box::from(pattern),
            host_split: parsed.host_split,
            params: parsed.params,
            handler,
            options,
        });
        let idx = method.index();
        let root = self.roots[idx].clone();
        let new_root = self.insert_at(&root, &parts, route)?;
        self.roots[idx] = new_root;
        self.size_delta += 1;
        Ok(())
    }

    fn insert_at(
        &mut self,
        node: &Arc<Node<T>>,
        parts: &[PatternPart],
        route: Arc<Route<T>>,
    ) -> RouterResult<Arc<Node<T>>> {
        if parts.is_empty() {
            if node.is_leaf() {
                return Err(RouterError::RouteExist {
                    pattern: route.pattern.to_string(),
                });
            }
            self.record_clone(node);
            let mut cloned = node.clone_shallow();
            cloned.route = Some(route);
            cloned.flags |= NodeFlags::LEAF;
            return Ok(Arc::new(cloned));
        }

        match &parts[0] {
            PatternPart::Literal(lit) => self.insert_literal(node, lit, parts, route),
            PatternPart::Param(spec) => self.insert_param(node, spec.clone(), parts, route),
            PatternPart::Wildcard(spec) => self.insert_wildcard(node, spec.clone(), parts, route),
        }
    }

    fn insert_literal(
        &mut self,
        node: &Arc<Node<T>>,
        lit: &str,
        parts: &[PatternPart],
        route: Arc<Route<T>>,
    ) -> RouterResult<Arc<Node<T>>> {
        let first_byte = lit.as_bytes()[0];
        let new_child = match node.get_static_edge_index(first_byte) {
            None => build_chain(parts, route),
            Some(idx) => {
                let existing_child = node.children[idx].clone();
                let clit = existing_child
                    .key
                    .as_static()
                    .expect("static edge has a static key")
                    .to_string();
                let cpl = common_prefix_len(lit, &clit);

                let replaced = if cpl == clit.len() && cpl == lit.len() {
                    self.insert_at(&existing_child, &parts[1..], route)?
                } else if cpl == clit.len() && cpl < lit.len() {
                    let mut next_parts = Vec::with_capacity(1 + parts.len() - 1);
                    next_parts.push(PatternPart::Literal(Box::from(&lit[cpl..])));
                    next_parts.extend_from_slice(&parts[1..]);
                    self.insert_at(&existing_child, &next_parts, route)?
                } else if cpl == lit.len() && cpl < clit.len() {
                    self.record_clone(&existing_child);
                    let mut truncated = existing_child.clone_shallow();
                    truncated.key = NodeKey::Static(Box::from(&clit[cpl..]));
                    let mut intermediate = Node::new(NodeKey::Static(Box::from(lit)));
                    intermediate.add_static_edge(Arc::new(truncated));
                    self.insert_at(&Arc::new(intermediate), &parts[1..], route)?
                } else {
                    self.record_clone(&existing_child);
                    let mut truncated = existing_child.clone_shallow();
                    truncated.key = NodeKey::Static(Box::from(&clit[cpl..]));

                    let mut tail_parts = Vec::with_capacity(1 + parts.len() - 1);
                    tail_parts.push(PatternPart::Literal(Box::from(&lit[cpl..])));
                    tail_parts.extend_from_slice(&parts[1..]);
                    let tail = build_chain(&tail_parts, route);

                    let mut intermediate = Node::new(NodeKey::Static(Box::from(&lit[..cpl])));
                    intermediate.add_static_edge(Arc::new(truncated));
                    intermediate.add_static_edge(tail);
                    Arc::new(intermediate)
                };

                self.record_clone(node);
                let mut cloned = node.clone_shallow();
                cloned.replace_static_edge(idx, replaced);
                return Ok(Arc::new(cloned));
            }
        };

        self.record_clone(node);
        let mut cloned = node.clone_shallow();
        cloned.add_static_edge(new_child);
        Ok(Arc::new(cloned))
    }

    fn insert_param(
        &mut self,
        node: &Arc<Node<T>>,
        spec: crate::node::ParamSpec,
        parts: &[PatternPart],
        route: Arc<Route<T>>,
    ) -> RouterResult<Arc<Node<T>>> {
        let is_new = node.param_child().is_none();
        let new_child = match node.param_child() {
            None => build_chain(parts, route),
            Some(existing) => {
                let existing_spec = match &existing.key {
                    NodeKey::Param(s) => s.clone(),
                    _ => unreachable!("param_child_index always points at a Param node"),
                };
                if !existing_spec.matches(&spec) {
                    let mut colliding = Vec::new();
                    collect_patterns(existing, &mut colliding);
                    return Err(RouterError::RouteConflict {
                        pattern: route.pattern.to_string(),
                        existing: colliding,
                    });
                }
                let existing = existing.clone();
                self.insert_at(&existing, &parts[1..], route)?
            }
        };
        self.record_clone(node);
        let mut cloned = node.clone_shallow();
        if is_new {
            cloned.set_param_edge(new_child);
        } else {
            cloned.replace_param_edge(new_child);
        }
        Ok(Arc::new(cloned))
    }

    fn insert_wildcard(
        &mut self,
        node: &Arc<Node<T>>,
        spec: crate::node::WildcardSpec,
        parts: &[PatternPart],
        route: Arc<Route<T>>,
    ) -> RouterResult<Arc<Node<T>>> {
        let is_new = node.wildcard_child().is_none();
        let new_child = match node.wildcard_child() {
            None => build_chain(parts, route),
            Some(existing) => {
                let existing_spec = match &existing.key {
                    NodeKey::Wildcard(s) => s.clone(),
                    _ => unreachable!("wildcard_child_index always points at a Wildcard node"),
                };
                if !existing_spec.matches(&spec) {
                    let mut colliding = Vec::new();
                    collect_patterns(existing, &mut colliding);
                    return Err(RouterError::RouteConflict {
                        pattern: route.pattern.to_string(),
                        existing: colliding,
                    });
                }
                let existing = existing.clone();
                self.insert_at(&existing, &parts[1..], route)?
            }
        };
        self.record_clone(node);
        let mut cloned = node.clone_shallow();
        if is_new {
            cloned.set_wildcard_edge(new_child);
        } else {
            cloned.replace_wildcard_edge(new_child);
        }
        Ok(Arc::new(cloned))
    }

    pub fn update(
        &mut self,
        method: HttpMethod,
        pattern: &str,
        handler: T,
        options: RouteOptions,
    ) -> RouterResult<()> {
        self.ensure_open()?;
        let (parts, parsed) = Self::combined_parts(pattern)?;
        let route = Arc::new(Route {
            pattern: Box::from(pattern),
            host_split: parsed.host_split,
            params: parsed.params,
            handler,
            options,
        });
        let idx = method.index();
        let root = self.roots[idx].clone();
        let new_root = self.update_at(&root, &parts, route, pattern)?;
        self.roots[idx] = new_root;
        Ok(())
    }

    fn update_at(
        &mut self,
        node: &Arc<Node<T>>,
        parts: &[PatternPart],
        route: Arc<Route<T>>,
        full_pattern: &str,
    ) -> RouterResult<Arc<Node<T>>> {
        if parts.is_empty() {
            if !node.is_leaf() {
                return Err(not_found(full_pattern));
            }
            self.record_clone(node);
            let mut cloned = node.clone_shallow();
            cloned.route = Some(route);
            return Ok(Arc::new(cloned));
        }
        match &parts[0] {
            PatternPart::Literal(lit) => self.update_literal(node, lit, &parts[1..], route, full_pattern),
            PatternPart::Param(_) => self.update_edge(node, &parts[1..], route, full_pattern, EdgeKind::Param),
            PatternPart::Wildcard(_) => {
                self.update_edge(node, &parts[1..], route, full_pattern, EdgeKind::Wildcard)
            }
        }
    }

    fn update_literal(
        &mut self,
        node: &Arc<Node<T>>,
        lit: &str,
        rest: &[PatternPart],
        route: Arc<Route<T>>,
        full_pattern: &str,
    ) -> RouterResult<Arc<Node<T>>> {
        let first_byte = lit.as_bytes()[0];
        let idx = node
            .get_static_edge_index(first_byte)
            .ok_or_else(|| not_found(full_pattern))?;
        let existing_child = node.children[idx].clone();
        let clit = existing_child
            .key
            .as_static()
            .expect("static edge has a static key")
            .to_string();
        let cpl = common_prefix_len(lit, &clit);

        let new_child = if cpl == clit.len() && cpl == lit.len() {
            self.update_at(&existing_child, rest, route, full_pattern)?
        } else if cpl == clit.len() && cpl < lit.len() {
            let mut next_parts = Vec::with_capacity(1 + rest.len());
            next_parts.push(PatternPart::Literal(Box::from(&lit[cpl..])));
            next_parts.extend_from_slice(rest);
            self.update_at(&existing_child, &next_parts, route, full_pattern)?
        } else {
            return Err(not_found(full_pattern));
        };

        self.record_clone(node);
        let mut cloned = node.clone_shallow();
        cloned.replace_static_edge(idx, new_child);
        Ok(Arc::new(cloned))
    }

    fn update_edge(
        &mut self,
        node: &Arc<Node<T>>,
        rest: &[PatternPart],
        route: Arc<Route<T>>,
        full_pattern: &str,
        kind: EdgeKind,
    ) -> RouterResult<Arc<Node<T>>> {
        let existing = match kind {
            EdgeKind::Param => node.param_child(),
            EdgeKind::Wildcard => node.wildcard_child(),
        }
        .cloned()
        .ok_or_else(|| not_found(full_pattern))?;
        let new_child = self.update_at(&existing, rest, route, full_pattern)?;
        self.record_clone(node);
        let mut cloned = node.clone_shallow();
        match kind {
            EdgeKind::Param => cloned.replace_param_edge(new_child),
            EdgeKind::Wildcard => cloned.replace_wildcard_edge(new_child),
        }
        Ok(Arc::new(cloned))
    }

    pub fn delete(&mut self, method: HttpMethod, pattern: &str) -> RouterResult<()> {
        self.ensure_open()?;
        let (parts, _parsed) = Self::combined_parts(pattern)?;
        let idx = method.index();
        let root = self.roots[idx].clone();
        let new_root = self.delete_at(&root, &parts, pattern)?;
        self.roots[idx] = new_root.unwrap_or_else(|| Arc::new(Node::default()));
        self.size_delta -= 1;
        Ok(())
    }

    fn delete_at(
        &mut self,
        node: &Arc<Node<T>>,
        parts: &[PatternPart],
        full_pattern: &str,
    ) -> RouterResult<Option<Arc<Node<T>>>> {
        if parts.is_empty() {
            if !node.is_leaf() {
                return Err(not_found(full_pattern));
            }
            self.record_clone(node);
            let mut cloned = node.clone_shallow();
            cloned.route = None;
            cloned.flags.remove(NodeFlags::LEAF);
            return Ok(collapse(cloned));
        }
        match &parts[0] {
            PatternPart::Literal(lit) => self.delete_literal(node, lit, &parts[1..], full_pattern),
            PatternPart::Param(_) => self.delete_edge(node, &parts[1..], full_pattern, EdgeKind::Param),
            PatternPart::Wildcard(_) => self.delete_edge(node, &parts[1..], full_pattern, EdgeKind::Wildcard),
        }
    }

    fn delete_literal(
        &mut self,
        node: &Arc<Node<T>>,
        lit: &str,
        rest: &[PatternPart],
        full_pattern: &str,
    ) -> RouterResult<Option<Arc<Node<T>>>> {
        let first_byte = lit.as_bytes()[0];
        let idx = node
            .get_static_edge_index(first_byte)
            .ok_or_else(|| not_found(full_pattern))?;
        let existing_child = node.children[idx].clone();
        let clit = existing_child
            .key
            .as_static()
            .expect("static edge has a static key")
            .to_string();
        let cpl = common_prefix_len(lit, &clit);

        let new_child = if cpl == clit.len() && cpl == lit.len() {
            self.delete_at(&existing_child, rest, full_pattern)?
        } else if cpl == clit.len() && cpl < lit.len() {
            let mut next_parts = Vec::with_capacity(1 + rest.len());
            next_parts.push(PatternPart::Literal(Box::from(&lit[cpl..])));
            next_parts.extend_from_slice(rest);
            self.delete_at(&existing_child, &next_parts, full_pattern)?
        } else {
            return Err(not_found(full_pattern));
        };

        self.record_clone(node);
        let mut cloned = node.clone_shallow();
        match new_child {
            Some(child) => cloned.replace_static_edge(idx, child),
            None => cloned.remove_child(idx),
        }
        Ok(collapse(cloned))
    }

    fn delete_edge(
        &mut self,
        node: &Arc<Node<T>>,
        rest: &[PatternPart],
        full_pattern: &str,
        kind: EdgeKind,
    ) -> RouterResult<Option<Arc<Node<T>>>> {
        let existing = match kind {
            EdgeKind::Param => node.param_child(),
            EdgeKind::Wildcard => node.wildcard_child(),
        }
        .cloned()
        .ok_or_else(|| not_found(full_pattern))?;

        let new_child = self.delete_at(&existing, rest, full_pattern)?;
        self.record_clone(node);
        let mut cloned = node.clone_shallow();
        match (kind, new_child) {
            (EdgeKind::Param, Some(c)) => cloned.replace_param_edge(c),
            (EdgeKind::Param, None) => {
                let idx = node.param_child_index.expect("param edge existed above");
                cloned.remove_child(idx);
            }
            (EdgeKind::Wildcard, Some(c)) => cloned.replace_wildcard_edge(c),
            (EdgeKind::Wildcard, None) => {
                let idx = node.wildcard_child_index.expect("wildcard edge existed above");
                cloned.remove_child(idx);
            }
        }
        Ok(collapse(cloned))
    }

    /// Clears registered routes. An empty `methods` resets every method's
    /// root; otherwise only the listed methods' roots are reset, leaving
    /// every other method's routes untouched (spec.md §4.4/§6, testable
    /// property 6).
    pub fn truncate(&mut self, methods: &[HttpMethod]) -> RouterResult<()> {
        self.ensure_open()?;
        let indices: Box<dyn Iterator<Item = usize>> = if methods.is_empty() {
            Box::new(0..METHOD_COUNT)
        } else {
            Box::new(methods.iter().map(|m| m.index()))
        };
        for idx in indices {
            self.size_delta -= count_routes(&self.roots[idx]) as i64;
            self.roots[idx] = Arc::new(Node::default());
        }
        Ok(())
    }

    /// Commits the transaction, publishing its roots atomically. A no-op
    /// returning `Ok(())` if already committed or aborted.
    pub fn commit(&mut self) -> RouterResult<()> {
        match self.state {
            TxnState::Open => {
                self.tree
                    .publish(self.roots.clone(), self.base_generation, self.size_delta)?;
                self.state = TxnState::Committed;
                Ok(())
            }
            TxnState::Committed | TxnState::Aborted => Ok(()),
        }
    }

    /// Discards the transaction's pending mutations. A no-op returning
    /// `Ok(())` if already committed or aborted.
    pub fn abort(&mut self) -> RouterResult<()> {
        if self.state == TxnState::Open {
            self.state = TxnState::Aborted;
        }
        Ok(())
    }
}

fn not_found(pattern: &str) -> RouterError {
    RouterError::RouteNotFound {
        pattern: pattern.to_string(),
    }
}

fn key_of(part: &PatternPart) -> NodeKey {
    match part {
        PatternPart::Literal(s) => NodeKey::Static(s.clone()),
        PatternPart::Param(spec) => NodeKey::Param(spec.clone()),
        PatternPart::Wildcard(spec) => NodeKey::Wildcard(spec.clone()),
    }
}

fn attach_child<T>(parent: &mut Node<T>, child: Arc<Node<T>>) {
    match &child.key {
        NodeKey::Static(_) => parent.add_static_edge(child),
        NodeKey::Param(_) => parent.set_param_edge(child),
        NodeKey::Wildcard(_) => parent.set_wildcard_edge(child),
    }
}

/// Builds a brand-new leaf chain for `parts` (non-empty), terminating in
/// `route`.
fn build_chain<T>(parts: &[PatternPart], route: Arc<Route<T>>) -> Arc<Node<T>> {
    let (last, init) = parts
        .split_last()
        .expect("build_chain requires at least one token");
    let mut leaf = Node::new(key_of(last));
    leaf.route = Some(route);
    leaf.flags |= NodeFlags::LEAF;
    let mut acc = Arc::new(leaf);
    for part in init.iter().rev() {
        let mut parent = Node::new(key_of(part));
        attach_child(&mut parent, acc);
        acc = Arc::new(parent);
    }
    acc
}

/// After a deletion, drops a node that became empty, and merges a node
/// that now has exactly one static child into that child — never across
/// the boundary where a hostname node's child starts the path portion of
/// a pattern, since lookup's delimiter switch depends on that boundary
/// being a real node edge (see `lookup::child_delim`).
fn collapse<T>(node: Node<T>) -> Option<Arc<Node<T>>> {
    if node.route.is_none() && node.children.is_empty() {
        return None;
    }
    if node.route.is_none() && node.children.len() == 1 {
        let only = &node.children[0];
        let mergeable = match (&node.key, &only.key) {
            (NodeKey::Static(p), NodeKey::Static(c)) => {
                !(!p.starts_with('/') && c.starts_with('/'))
            }
            _ => false,
        };
        if mergeable {
            let parent_lit = node.key.as_static().expect("checked above");
            let child_lit = only.key.as_static().expect("checked above");
            let merged_key = format!("{parent_lit}{child_lit}");
            let mut merged = (**only).clone_shallow();
            merged.key = NodeKey::Static(Box::from(merged_key));
            return Some(Arc::new(merged));
        }
    }
    Some(Arc::new(node))
}
