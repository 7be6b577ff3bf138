//! Captured parameter output handed back to the HTTP layer (spec.md §6).
//!
//! Values are owned (`Box<str>`) rather than borrowed out of the input
//! path/host. This trades the one-copy-per-capture cost spec.md's "no
//! allocations on the hot path beyond parameter slice growth" note would
//! prefer, in exchange for a [`Params`] that can be recycled through the
//! per-tree [`crate::lookup::ContextPool`] (spec.md §4.3/§9) without unsafe
//! lifetime extension — documented as a deliberate tradeoff in DESIGN.md.

use std::sync::Arc;

use smallvec::SmallVec;

/// Ordered list of `(name, value)` captures for one matched route.
#[derive(Debug, Clone, Default)]
pub struct Params {
    entries: SmallVec<[(Arc<str>, Box<str>); 8]>,
}

impl Params {
    pub fn new() -> Self {
        Self {
            entries: SmallVec::new(),
        }
    }

    pub(crate) fn push(&mut self, name: Arc<str>, value: &str) {
        self.entries.push((name, Box::from(value)));
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_ref(), v.as_ref()))
    }
}
