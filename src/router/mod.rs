//! # Router Module
//!
//! Host routing glue: a radix-tree route table built from the routed operations
//! of discovered endpoint types.
//!
//! ```rust,ignore
//! let router = Router::from_endpoints(&discovery.endpoint_types(&discovery.modules()));
//! if let Some(m) = router.route(&Method::GET, "/pets/123?verbose=true") {
//!     println!("{} on {}", m.route.operation.name(), m.route.owner);
//! }
//! ```

mod core;
mod radix;

pub use core::{RouteInfo, RouteMatch, RoutedOperation, Router};
pub use radix::RadixTree;
