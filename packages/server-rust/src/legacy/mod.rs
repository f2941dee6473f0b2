//! Legacy controller-style HTTP surface.
//!
//! Requests are resolved against a fixed route table, authorized with the
//! shared [`Authorizer`](crate::security::Authorizer), and dispatched through
//! the same bridge the RPC services use.

pub mod codec;
pub mod error;
pub mod pipeline;
pub mod routes;

pub use codec::{Codec, CodecError};
pub use error::{LegacyError, ResolveError};
pub use pipeline::{legacy_router, LegacyState};
pub use routes::{InternalContext, LegacyAction, RouteKind, RouteSpec, RouteTable};
