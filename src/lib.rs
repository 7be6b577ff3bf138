//! A concurrent, copy-on-write pattern-matching routing tree.
//!
//! One [`tree::Tree`] holds one immutable node graph per [`method::HttpMethod`],
//! published behind an `arc_swap::ArcSwap` so [`tree::Tree::lookup`] never
//! blocks on a writer. Mutation goes through a single-writer
//! [`txn::Txn`]: `begin_txn`, make your changes, `commit`.
//!
//! ```
//! use router_core::{HttpMethod, RouteOptions, Tree};
//!
//! let tree: Tree<&'static str> = Tree::with_default_options();
//! tree.insert(HttpMethod::Get, "/users/{id}", "get_user", RouteOptions::default())
//!     .unwrap();
//!
//! let matched = tree.lookup(HttpMethod::Get, "", "/users/42").unwrap();
//! assert_eq!(matched.params.get("id"), Some("42"));
//! ```

pub mod error;
pub mod lookup;
pub mod method;
pub mod node;
pub mod options;
pub mod params;
pub mod pattern;
pub mod route;
pub mod tree;
pub mod txn;

pub use error::{InvalidRouteReason, RouterError, RouterResult};
pub use lookup::{ContextPool, LookupContext, LookupOutcome};
pub use method::{HttpMethod, METHOD_COUNT};
pub use options::{RouterOptions, RouterOptionsBuilder};
pub use params::Params;
pub use route::{ParamDescriptor, Route, RouteOptions};
pub use tree::{Matched, Snapshot, Tree};
pub use txn::Txn;
