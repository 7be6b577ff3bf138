//! Ambient tree configuration, trimmed from the teacher's
//! `router::options` builder style to the knobs this crate's core actually
//! reads. Path normalization/unescaping knobs are intentionally absent —
//! that's an explicit non-goal (SPEC_FULL.md), left to a layer above this
//! crate.

use crate::error::{RouterError, RouterResult};

/// Default capacity of a transaction's clone-memoization cache
/// (spec.md §4.4/§9; grounded in the `lru` crate's API).
pub const DEFAULT_CLONE_CACHE_CAPACITY: usize = 4096;

/// Default cap on how many parameter/wildcard captures a single route may
/// declare, a sanity bound rather than a hard protocol limit.
pub const DEFAULT_MAX_PARAMS: usize = 32;

/// Configuration for a [`crate::tree::Tree`], built once at construction
/// time and immutable thereafter.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub(crate) clone_cache_capacity: usize,
    pub(crate) max_params: usize,
    pub(crate) compute_tsr: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        RouterOptions {
            clone_cache_capacity: DEFAULT_CLONE_CACHE_CAPACITY,
            max_params: DEFAULT_MAX_PARAMS,
            compute_tsr: true,
        }
    }
}

impl RouterOptions {
    pub fn builder() -> RouterOptionsBuilder {
        RouterOptionsBuilder::default()
    }
}

/// Builder for [`RouterOptions`], mirroring the teacher's fluent
/// `router::options::Options` construction style.
#[derive(Debug, Clone, Default)]
pub struct RouterOptionsBuilder {
    clone_cache_capacity: Option<usize>,
    max_params: Option<usize>,
    compute_tsr: Option<bool>,
}

impl RouterOptionsBuilder {
    pub fn clone_cache_capacity(mut self, capacity: usize) -> Self {
        self.clone_cache_capacity = Some(capacity);
        self
    }

    pub fn max_params(mut self, max: usize) -> Self {
        self.max_params = Some(max);
        self
    }

    /// Disables trailing-slash recommendation computation entirely, trading
    /// it away for a slightly cheaper miss path.
    pub fn compute_tsr(mut self, enabled: bool) -> Self {
        self.compute_tsr = Some(enabled);
        self
    }

    pub fn build(self) -> RouterResult<RouterOptions> {
        let clone_cache_capacity = self
            .clone_cache_capacity
            .unwrap_or(DEFAULT_CLONE_CACHE_CAPACITY);
        if clone_cache_capacity == 0 {
            return Err(RouterError::InvalidConfig {
                reason: "clone_cache_capacity must be non-zero".to_string(),
            });
        }
        let max_params = self.max_params.unwrap_or(DEFAULT_MAX_PARAMS);
        if max_params == 0 {
            return Err(RouterError::InvalidConfig {
                reason: "max_params must be non-zero".to_string(),
            });
        }
        Ok(RouterOptions {
            clone_cache_capacity,
            max_params,
            compute_tsr: self.compute_tsr.unwrap_or(true),
        })
    }
}
