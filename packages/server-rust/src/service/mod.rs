//! Lifecycle-managed services and background workers.
//!
//! The node starts every [`ManagedService`] in registration order once its
//! listeners are bound, and stops them in reverse order on shutdown.

pub mod registry;
pub mod worker;

pub use registry::{DuplicateManagedService, ManagedService, ServiceContext, ServiceRegistry};
pub use worker::{BackgroundRunnable, BackgroundWorker};
