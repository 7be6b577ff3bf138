//! The lookup engine: method selection, host/path split, the walk with
//! backtracking, and trailing-slash (TSR) recommendation — spec.md §4.3.
//!
//! The skipped-node stack spec.md §4.4/§9 describes is implemented as
//! ordinary recursive-function backtracking rather than a hand-rolled
//! `Vec`-based stack: recursion depth here is bounded by the *registered*
//! tree depth (`Tree::max_depth`), not by attacker-controlled input length
//! (a literal node consumes many input bytes per call frame), so plain
//! recursion is a safe, idiomatic choice in Rust — see DESIGN.md.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::node::{Node, NodeKey};
use crate::params::Params;
use crate::route::Route;

const POOL_CAPACITY: usize = 256;

/// Per-lookup scratch state, drawn from a [`ContextPool`] at lookup entry
/// and returned at exit (spec.md §5).
pub struct LookupContext<T> {
    pub params: Params,
    pub tsr_params: Params,
    tsr_route: Option<Arc<Route<T>>>,
    compute_tsr: bool,
}

impl<T> Default for LookupContext<T> {
    fn default() -> Self {
        LookupContext {
            params: Params::new(),
            tsr_params: Params::new(),
            tsr_route: None,
            compute_tsr: true,
        }
    }
}

impl<T> LookupContext<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self, compute_tsr: bool) {
        self.params.clear();
        self.tsr_params.clear();
        self.tsr_route = None;
        self.compute_tsr = compute_tsr;
    }

    fn tsr_found(&self) -> bool {
        !self.compute_tsr || self.tsr_route.is_some()
    }

    /// Records the first TSR candidate discovered; later discoveries during
    /// backtracking are ignored per spec.md §4.3. A no-op when TSR
    /// computation is disabled via `RouterOptions`.
    fn record_tsr(&mut self, route: Arc<Route<T>>) {
        if !self.compute_tsr || self.tsr_route.is_some() {
            return;
        }
        self.tsr_params = self.params.clone();
        self.tsr_route = Some(route);
    }

    fn take_tsr(&mut self) -> Option<Arc<Route<T>>> {
        self.tsr_route.take()
    }
}

/// A pool of reusable [`LookupContext`]s, one per tree, avoiding a fresh
/// allocation of the parameter/backtracking buffers on every lookup
/// (spec.md §4.3/§9; grounded in the teacher's `Interner`'s lock-guarded
/// shared-table pattern, generalized here to a free-list).
pub struct ContextPool<T> {
    free: Mutex<Vec<LookupContext<T>>>,
}

impl<T> Default for ContextPool<T> {
    fn default() -> Self {
        ContextPool {
            free: Mutex::new(Vec::new()),
        }
    }
}

impl<T> ContextPool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> LookupContext<T> {
        self.free.lock().pop().unwrap_or_default()
    }

    pub fn release(&self, mut ctx: LookupContext<T>) {
        ctx.reset(true);
        let mut guard = self.free.lock();
        if guard.len() < POOL_CAPACITY {
            guard.push(ctx);
        }
    }

    /// Current number of idle contexts held by the pool (observability).
    pub fn idle_len(&self) -> usize {
        self.free.lock().len()
    }
}

/// Outcome of a successful lookup: either a direct match or a
/// trailing-slash recommendation (spec.md §4.3).
pub struct LookupOutcome<T> {
    pub route: Arc<Route<T>>,
    pub tsr: bool,
}

/// Walks `method_root` for `(host, path)`. `lazy = true` skips parameter
/// capture entirely (spec.md §4.3 contract).
pub fn lookup<T>(
    method_root: &Node<T>,
    host: &str,
    path: &str,
    lazy: bool,
    compute_tsr: bool,
    ctx: &mut LookupContext<T>,
) -> Option<LookupOutcome<T>> {
    ctx.reset(compute_tsr);

    let path_only = is_path_only(method_root);

    if !path_only && !host.is_empty() {
        let combined = format!("{host}{path}");
        if let Some(route) = walk_node(method_root, &combined, b'.', lazy, ctx) {
            return Some(LookupOutcome { route, tsr: false });
        }
        // Falling back to the path-only subtree on miss (spec.md §4.3):
        // discard any partial host-side captures before retrying.
        ctx.params.clear();
    }

    if let Some(route) = walk_node(method_root, path, b'/', lazy, ctx) {
        return Some(LookupOutcome { route, tsr: false });
    }

    ctx.take_tsr().map(|route| LookupOutcome { route, tsr: true })
}

/// True when the root has exactly one child and it is a static edge
/// starting with `/` — the tree holds only path-only routes, so hostname
/// matching can be skipped entirely (spec.md §4.3).
fn is_path_only<T>(root: &Node<T>) -> bool {
    root.children.len() == 1
        && matches!(&root.children[0].key, NodeKey::Static(s) if s.as_bytes().first() == Some(&b'/'))
}

/// Delimiter to use when matching `child`: once in path mode we stay there;
/// otherwise we flip to path mode the moment we reach the node that starts
/// the path portion of a pattern (always a static edge beginning with `/`,
/// by the grammar in spec.md §6).
fn child_delim<T>(current: u8, child: &Node<T>) -> u8 {
    if current == b'/' {
        return b'/';
    }
    match &child.key {
        NodeKey::Static(s) if s.as_bytes().first() == Some(&b'/') => b'/',
        _ => b'.',
    }
}

fn delim_str(delim: u8) -> &'static str {
    match delim {
        b'/' => "/",
        b'.' => ".",
        _ => unreachable!("only '/' and '.' are used as segment delimiters"),
    }
}

/// Matches `node.key` against the front of `input`, then resolves whatever
/// remains at `node`. Returns `Some` only for a direct match; a trailing
/// slash recommendation is recorded into `ctx` as a side effect.
fn walk_node<T>(
    node: &Node<T>,
    input: &str,
    delim: u8,
    lazy: bool,
    ctx: &mut LookupContext<T>,
) -> Option<Arc<Route<T>>> {
    match &node.key {
        NodeKey::Static(lit) => {
            if input.len() >= lit.len() && &input[..lit.len()] == lit.as_ref() {
                resolve_at(node, &input[lit.len()..], delim, lazy, ctx)
            } else {
                maybe_tsr_missing_delim(node, input, lit, delim, ctx);
                None
            }
        }
        NodeKey::Param(spec) => {
            let (value, rest) = capture_param(spec, input, delim)?;
            let checkpoint = ctx.params.len();
            if !lazy {
                ctx.params.push(spec.name.clone(), value);
            }
            match resolve_at(node, rest, delim, lazy, ctx) {
                Some(route) => Some(route),
                None => {
                    ctx.params.truncate(checkpoint);
                    None
                }
            }
        }
        NodeKey::Wildcard(spec) => wildcard_match(node, spec, input, delim, lazy, ctx),
    }
}

/// A literal key didn't match, but it is exactly `input` plus one trailing
/// delimiter — recommend adding the slash back (spec.md §4.3 rule 2).
fn maybe_tsr_missing_delim<T>(
    node: &Node<T>,
    input: &str,
    lit: &str,
    delim: u8,
    ctx: &mut LookupContext<T>,
) {
    if ctx.tsr_found() || !node.is_leaf() {
        return;
    }
    let lit_bytes = lit.as_bytes();
    if lit_bytes.len() == input.len() + 1
        && lit_bytes[lit_bytes.len() - 1] == delim
        && &lit[..lit.len() - 1] == input
    {
        ctx.record_tsr(node.route.clone().expect("leaf has a route"));
    }
}

/// Resolves whatever remains of the input at `node` after its own key has
/// been consumed: either a direct leaf match, descent into children, or a
/// TSR recommendation.
fn resolve_at<T>(
    node: &Node<T>,
    remaining: &str,
    delim: u8,
    lazy: bool,
    ctx: &mut LookupContext<T>,
) -> Option<Arc<Route<T>>> {
    if remaining.is_empty() {
        if let Some(route) = &node.route {
            return Some(route.clone());
        }
        // An ending wildcard child may still match on an empty remainder
        // (spec.md §9 open question (b)): `node` itself isn't a leaf, but
        // its wildcard child's own route can still consume a zero-length
        // capture, so try it before falling back to a TSR guess.
        if let Some(route) = try_children(node, remaining, delim, lazy, ctx) {
            return Some(route);
        }
        // rule 1: non-leaf node, but a "/"-only static child is a leaf —
        // recommend adding the slash.
        if !ctx.tsr_found()
            && let Some(child) = node.get_static_edge(delim)
            && child.key.as_static() == Some(delim_str(delim))
            && child.is_leaf()
        {
            ctx.record_tsr(child.route.clone().expect("leaf has a route"));
        }
        return None;
    }

    if let Some(route) = try_children(node, remaining, delim, lazy, ctx) {
        return Some(route);
    }

    // rule 2: dead end with exactly one leftover delimiter at a leaf —
    // recommend removing the slash.
    if remaining == delim_str(delim)
        && node.is_leaf()
        && !ctx.tsr_found()
        && let Some(route) = &node.route
    {
        ctx.record_tsr(route.clone());
    }
    None
}

/// Tries static (by first byte), then parameter, then wildcard children, in
/// that priority order, restoring captured params on each failed attempt
/// (spec.md §4.3 priority + backtracking).
fn try_children<T>(
    node: &Node<T>,
    remaining: &str,
    delim: u8,
    lazy: bool,
    ctx: &mut LookupContext<T>,
) -> Option<Arc<Route<T>>> {
    if let Some(&b) = remaining.as_bytes().first()
        && let Some(child) = node.get_static_edge(b)
    {
        let checkpoint = ctx.params.len();
        let cd = child_delim(delim, child);
        if let Some(route) = walk_node(child, remaining, cd, lazy, ctx) {
            return Some(route);
        }
        ctx.params.truncate(checkpoint);
    }

    if let Some(child) = node.param_child() {
        let checkpoint = ctx.params.len();
        let cd = child_delim(delim, child);
        if let Some(route) = walk_node(child, remaining, cd, lazy, ctx) {
            return Some(route);
        }
        ctx.params.truncate(checkpoint);
    }

    if let Some(child) = node.wildcard_child() {
        let checkpoint = ctx.params.len();
        let cd = child_delim(delim, child);
        if let Some(route) = walk_node(child, remaining, cd, lazy, ctx) {
            return Some(route);
        }
        ctx.params.truncate(checkpoint);
    }

    None
}

/// Captures a named parameter's value from the front of `input`, honoring
/// an optional literal suffix and regex constraint (spec.md §4.3/§6).
fn capture_param<'a>(
    spec: &crate::node::ParamSpec,
    input: &'a str,
    delim: u8,
) -> Option<(&'a str, &'a str)> {
    let dpos = memchr::memchr(delim, input.as_bytes()).unwrap_or(input.len());
    let segment = &input[..dpos];
    let rest = &input[dpos..];

    let value = if spec.suffix.is_empty() {
        segment
    } else {
        if !segment.ends_with(spec.suffix.as_ref()) {
            return None;
        }
        &segment[..segment.len() - spec.suffix.len()]
    };

    if value.is_empty() {
        return None; // non-empty capture required for named parameters
    }
    if let Some(re) = &spec.regex
        && !re.is_match(value)
    {
        return None;
    }
    Some((value, rest))
}

/// Greedy-with-retry wildcard capture: tries widening one-segment captures
/// against the continuation subtree first (more specific, spec.md §4.3
/// priority), then falls back to consuming the entire remainder for the
/// node's own "ending" route if one is registered (spec.md §8 scenario 2).
fn wildcard_match<T>(
    node: &Node<T>,
    spec: &crate::node::WildcardSpec,
    input: &str,
    delim: u8,
    lazy: bool,
    ctx: &mut LookupContext<T>,
) -> Option<Arc<Route<T>>> {
    let bytes = input.as_bytes();
    let mut pos = 0usize;
    while let Some(rel) = memchr::memchr(delim, &bytes[pos..]) {
        let boundary = pos + rel;
        pos = boundary + 1;
        if boundary == 0 {
            continue; // an infix wildcard requires a non-empty capture
        }
        let value = &input[..boundary];
        let rest = &input[boundary..];
        if let Some(re) = &spec.regex
            && !re.is_match(value)
        {
            continue;
        }
        let checkpoint = ctx.params.len();
        if !lazy {
            ctx.params.push(spec.name.clone(), value);
        }
        if let Some(route) = try_children(node, rest, delim, lazy, ctx) {
            return Some(route);
        }
        ctx.params.truncate(checkpoint);
    }

    // Ending catch-all: consumes the remainder verbatim, possibly empty
    // (spec.md §9 open question b).
    if let Some(route) = &node.route {
        let matches = match &spec.regex {
            Some(re) => re.is_match(input),
            None => true,
        };
        if matches {
            if !lazy {
                ctx.params.push(spec.name.clone(), input);
            }
            return Some(route.clone());
        }
    }

    None
}
