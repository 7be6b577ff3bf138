//! The concurrent routing tree: one immutable, `Arc`-shared node graph per
//! HTTP method, published atomically via `ArcSwap` so lookups never block
//! on a writer (spec.md §3, §9).
//!
//! Grounded in the teacher's `Arc<ArcSwap<RouteTable>>` publication pattern
//! (`examples/jizhuozhi-hermes/gateway/src/server/state.rs`), generalized
//! from a single flat table to one root per [`HttpMethod`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::instrument;

use crate::error::{RouterError, RouterResult};
use crate::lookup::{self, ContextPool};
use crate::method::{HttpMethod, METHOD_COUNT};
use crate::node::Node;
use crate::options::RouterOptions;
use crate::params::Params;
use crate::pattern::{PatternPart, parse_pattern};
use crate::route::{Route, RouteOptions};
use crate::txn::Txn;

/// A published snapshot: one root node per method. Readers hold an `Arc`
/// to exactly one `Roots` for the whole duration of a lookup, so a
/// concurrent writer publishing a new snapshot never disturbs them.
pub(crate) struct Roots<T> {
    pub(crate) methods: [Arc<Node<T>>; METHOD_COUNT],
}

impl<T> Roots<T> {
    fn empty() -> Self {
        Roots {
            methods: std::array::from_fn(|_| Arc::new(Node::default())),
        }
    }
}

/// A successful lookup: the matched route, its captured parameters, and
/// whether the match is a trailing-slash recommendation rather than a
/// direct hit (spec.md §4.3).
pub struct Matched<T> {
    pub route: Arc<Route<T>>,
    pub params: Params,
    pub tsr: bool,
}

/// The routing tree. Cheap to share: clone the `Arc` you wrap it in, or
/// keep it behind a `&'static`/`Arc<Tree<T>>` in your application state.
pub struct Tree<T> {
    roots: ArcSwap<Roots<T>>,
    write_lock: Mutex<()>,
    generation: AtomicU64,
    size: AtomicUsize,
    options: RouterOptions,
    pool: ContextPool<T>,
}

impl<T> Tree<T> {
    pub fn new(options: RouterOptions) -> Self {
        Tree {
            roots: ArcSwap::from_pointee(Roots::empty()),
            write_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            size: AtomicUsize::new(0),
            options,
            pool: ContextPool::new(),
        }
    }

    pub fn with_default_options() -> Self {
        Self::new(RouterOptions::default())
    }

    pub(crate) fn load_roots(&self) -> arc_swap::Guard<Arc<Roots<T>>> {
        self.roots.load()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub(crate) fn clone_cache_capacity(&self) -> usize {
        self.options.clone_cache_capacity
    }

    pub(crate) fn max_params(&self) -> usize {
        self.options.max_params
    }

    /// Atomically publishes a writer's new roots, provided no other commit
    /// has landed since the writer's transaction began. The single-writer
    /// mutex held for a `Txn`'s whole lifetime makes a mismatch here a bug,
    /// not a contended retry path (spec.md §9).
    pub(crate) fn publish(
        &self,
        new_roots: [Arc<Node<T>>; METHOD_COUNT],
        base_generation: u64,
        size_delta: i64,
    ) -> RouterResult<()> {
        let observed = self.generation.load(Ordering::Acquire);
        if observed != base_generation {
            return Err(RouterError::ConcurrentAccess {
                expected: base_generation,
                observed,
            });
        }
        self.roots.store(Arc::new(Roots { methods: new_roots }));
        self.generation.store(observed + 1, Ordering::Release);
        if size_delta >= 0 {
            self.size.fetch_add(size_delta as usize, Ordering::Relaxed);
        } else {
            self.size
                .fetch_sub(size_delta.unsigned_abs() as usize, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Begins a single-writer transaction. Blocks until any other writer's
    /// transaction has committed or aborted (spec.md §4.4).
    pub fn begin_txn(&self) -> Txn<'_, T> {
        let guard = self.write_lock.lock();
        Txn::new(self, guard)
    }

    pub fn insert(
        &self,
        method: HttpMethod,
        pattern: &str,
        handler: T,
        options: RouteOptions,
    ) -> RouterResult<()> {
        let mut txn = self.begin_txn();
        txn.insert(method, pattern, handler, options)?;
        txn.commit()
    }

    pub fn update(
        &self,
        method: HttpMethod,
        pattern: &str,
        handler: T,
        options: RouteOptions,
    ) -> RouterResult<()> {
        let mut txn = self.begin_txn();
        txn.update(method, pattern, handler, options)?;
        txn.commit()
    }

    pub fn delete(&self, method: HttpMethod, pattern: &str) -> RouterResult<()> {
        let mut txn = self.begin_txn();
        txn.delete(method, pattern)?;
        txn.commit()
    }

    /// Clears registered routes. An empty `methods` truncates every method;
    /// otherwise only the listed methods' roots are reset (spec.md §4.4/§6).
    pub fn truncate(&self, methods: &[HttpMethod]) -> RouterResult<()> {
        let mut txn = self.begin_txn();
        txn.truncate(methods)?;
        txn.commit()
    }

    #[instrument(level = "trace", skip(self), fields(method = %method))]
    pub fn lookup(&self, method: HttpMethod, host: &str, path: &str) -> Option<Matched<T>> {
        let snapshot = self.roots.load();
        lookup_on_root(
            &snapshot.methods[method.index()],
            &self.pool,
            self.options.compute_tsr,
            host,
            path,
            false,
        )
    }

    /// Like [`Tree::lookup`] but skips parameter capture entirely, for
    /// callers that only need to know whether a route exists.
    pub fn lookup_lazy(&self, method: HttpMethod, host: &str, path: &str) -> Option<Matched<T>> {
        let snapshot = self.roots.load();
        lookup_on_root(
            &snapshot.methods[method.index()],
            &self.pool,
            self.options.compute_tsr,
            host,
            path,
            true,
        )
    }

    /// Total number of registered routes across all methods.
    pub fn len(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reverse lookup: the options stashed with a pattern at registration
    /// time, structurally re-matched rather than walked as input bytes.
    pub fn route_options(&self, method: HttpMethod, pattern: &str) -> RouterResult<RouteOptions> {
        let snapshot = self.roots.load();
        route_options_on_root(&snapshot.methods[method.index()], pattern)
    }

    /// All registered patterns for `method`, in tree order (not matching
    /// priority order).
    pub fn iter(&self, method: HttpMethod) -> Vec<String> {
        let snapshot = self.roots.load();
        iter_on_root(&snapshot.methods[method.index()])
    }

    /// A consistent, `Arc`-pinned view of every method's root as of the
    /// moment of the call (spec.md §6's `snapshot()`). Unlike `lookup`/
    /// `route_options`/`iter`, which each reload independently and so could
    /// observe two different published generations if a writer commits
    /// between calls, every read made through the returned [`Snapshot`]
    /// sees exactly this one generation.
    pub fn snapshot(&self) -> Snapshot<'_, T> {
        Snapshot {
            tree: self,
            roots: self.roots.load_full(),
            generation: self.generation(),
        }
    }
}

/// A frozen, `Arc`-pinned view of a [`Tree`]'s roots, obtained via
/// [`Tree::snapshot`]. Every `lookup`/`route_options`/`iter` call made
/// through one `Snapshot` is guaranteed to see the same published
/// generation, even if the tree's writer commits again in the meantime.
pub struct Snapshot<'a, T> {
    tree: &'a Tree<T>,
    roots: Arc<Roots<T>>,
    generation: u64,
}

impl<'a, T> Snapshot<'a, T> {
    /// The tree generation this snapshot is pinned to (spec.md §9).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn lookup(&self, method: HttpMethod, host: &str, path: &str) -> Option<Matched<T>> {
        lookup_on_root(
            &self.roots.methods[method.index()],
            &self.tree.pool,
            self.tree.options.compute_tsr,
            host,
            path,
            false,
        )
    }

    pub fn lookup_lazy(&self, method: HttpMethod, host: &str, path: &str) -> Option<Matched<T>> {
        lookup_on_root(
            &self.roots.methods[method.index()],
            &self.tree.pool,
            self.tree.options.compute_tsr,
            host,
            path,
            true,
        )
    }

    pub fn route_options(&self, method: HttpMethod, pattern: &str) -> RouterResult<RouteOptions> {
        route_options_on_root(&self.roots.methods[method.index()], pattern)
    }

    pub fn iter(&self, method: HttpMethod) -> Vec<String> {
        iter_on_root(&self.roots.methods[method.index()])
    }
}

fn lookup_on_root<T>(
    root: &Node<T>,
    pool: &ContextPool<T>,
    compute_tsr: bool,
    host: &str,
    path: &str,
    lazy: bool,
) -> Option<Matched<T>> {
    let mut ctx = pool.acquire();
    let outcome = lookup::lookup(root, host, path, lazy, compute_tsr, &mut ctx);
    let result = outcome.map(|o| {
        let params = if o.tsr {
            ctx.tsr_params.clone()
        } else {
            ctx.params.clone()
        };
        Matched {
            route: o.route,
            params,
            tsr: o.tsr,
        }
    });
    pool.release(ctx);
    result
}

fn route_options_on_root<T>(root: &Node<T>, pattern: &str) -> RouterResult<RouteOptions> {
    let parsed = parse_pattern(pattern)?;
    let mut parts = Vec::with_capacity(parsed.host_parts.len() + parsed.path_parts.len());
    parts.extend(parsed.host_parts);
    parts.extend(parsed.path_parts);
    find_leaf(root, &parts)
        .map(|route| route.options.clone())
        .ok_or_else(|| RouterError::RouteNotFound {
            pattern: pattern.to_string(),
        })
}

fn iter_on_root<T>(root: &Node<T>) -> Vec<String> {
    let mut out = Vec::new();
    collect_patterns(root, &mut out);
    out
}

/// Read-only structural match of `parts` against the existing tree shape —
/// used by [`Tree::route_options`] and transaction navigation in `txn.rs`.
pub(crate) fn find_leaf<T>(node: &Node<T>, parts: &[PatternPart]) -> Option<Arc<Route<T>>> {
    if parts.is_empty() {
        return node.route.clone();
    }
    match &parts[0] {
        PatternPart::Literal(lit) => {
            let first_byte = lit.as_bytes().first().copied()?;
            let child = node.get_static_edge(first_byte)?;
            let clit = child.key.as_static()?;
            let cpl = crate::node::common_prefix_len(lit, clit);
            if cpl == clit.len() && cpl == lit.len() {
                find_leaf(child, &parts[1..])
            } else if cpl == clit.len() && cpl < lit.len() {
                let mut next = Vec::with_capacity(1 + parts.len() - 1);
                next.push(PatternPart::Literal(Box::from(&lit[cpl..])));
                next.extend_from_slice(&parts[1..]);
                find_leaf(child, &next)
            } else {
                None
            }
        }
        PatternPart::Param(_) => find_leaf(node.param_child()?, &parts[1..]),
        PatternPart::Wildcard(_) => find_leaf(node.wildcard_child()?, &parts[1..]),
    }
}

pub(crate) fn collect_patterns<T>(node: &Node<T>, out: &mut Vec<String>) {
    if let Some(route) = &node.route {
        out.push(route.pattern.to_string());
    }
    for child in &node.children {
        collect_patterns(child, out);
    }
}

pub(crate) fn count_routes<T>(node: &Node<T>) -> usize {
    let mut n = usize::from(node.route.is_some());
    for child in &node.children {
        n += count_routes(child);
    }
    n
}
