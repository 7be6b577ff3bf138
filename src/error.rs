//! Error taxonomy surfaced to callers. Errors are values, never panics,
//! except for [`RouterError::ConcurrentAccess`] which indicates a
//! programming bug and is documented as acceptable to crash on.

use thiserror::Error;

/// The full error taxonomy of the routing tree core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// Reported at registration time only; never during lookup.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidRoute {
        pattern: String,
        reason: InvalidRouteReason,
    },

    /// A `RouterOptions`/builder value failed validation.
    #[error("invalid router configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A leaf already exists at the insertion point with a different route.
    #[error("route already exists for pattern '{pattern}'")]
    RouteExist { pattern: String },

    /// The new pattern would bisect a parameter/wildcard token of an
    /// existing pattern, or introduce one inside an existing common prefix.
    #[error("route '{pattern}' conflicts with existing pattern(s): {existing:?}")]
    RouteConflict {
        pattern: String,
        existing: Vec<String>,
    },

    /// `update`/`delete` targeted a pattern that is not a registered leaf.
    #[error("no route registered for pattern '{pattern}'")]
    RouteNotFound { pattern: String },

    /// Attempted to mutate a transaction that has already committed.
    #[error("transaction has already committed; further mutation is read-only")]
    ReadOnlyTxn,

    /// Attempted to mutate a transaction that has already aborted.
    #[error("transaction has already settled (committed or aborted)")]
    SettledTxn,

    /// Two writers bypassed the single-writer mutex; the race sentinel
    /// caught a generation mismatch at commit time. Indicates a bug in the
    /// caller, not a transient condition — it is not meant to be retried.
    #[error("concurrent writer detected on tree generation {expected} (observed {observed})")]
    ConcurrentAccess { expected: u64, observed: u64 },
}

/// Subcategory of [`RouterError::InvalidRoute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidRouteReason {
    #[error("path must start with '/'")]
    MissingLeadingSlash,
    #[error("empty path is not a valid pattern")]
    EmptyPath,
    #[error("brace group is not closed")]
    UnclosedBrace,
    #[error("brace nesting is unbalanced")]
    UnbalancedBraces,
    #[error("parameter name before ':' must not contain '/'")]
    InvalidParamName,
    #[error("wildcard must be preceded by '/' or start a segment")]
    WildcardWrongPosition,
    #[error("wildcard requires a '{{name}}' argument")]
    WildcardMissingArgument,
    #[error("an infix wildcard must be followed by at least one literal byte before the next '/'")]
    InfixWildcardMissingSuffix,
    #[error("regex constraint failed to compile")]
    InvalidRegex,
    #[error("pattern declares more parameters than RouterOptions::max_params allows")]
    TooManyParams,
}

pub type RouterResult<T> = Result<T, RouterError>;
