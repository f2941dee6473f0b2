//! Authentication and authorization backends.

pub mod insecure;
pub mod internal;
pub mod jwt;
pub mod policy;

pub use insecure::InsecureAuthenticationProvider;
pub use internal::InternalAuthenticationProvider;
pub use jwt::JwtAuthenticationProvider;
pub use policy::{PassthroughAuthorizationProvider, PolicyAuthorizationProvider};
