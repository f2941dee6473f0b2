//! Internal dispatch bridge.
//!
//! Converts an authorized command into an [`InternalMessage`](streamgate_core::InternalMessage),
//! publishes it on the [`MessageBus`](crate::traits::MessageBus) and awaits the
//! correlated reply through a tower stack:
//!
//! 1. **Load shedding** (`middleware::load_shed`)
//! 2. **Reply timeout** (`middleware::timeout`)
//! 3. **Instrumentation** (`middleware::metrics`)
//! 4. **Bus** (`bus`): publish, attach the reply envelope, await

pub mod bridge;
pub mod bus;
pub mod middleware;
pub mod pipeline;
pub mod request;

pub use bridge::DispatchBridge;
pub use bus::{BusService, ReplyEnvelope};
pub use pipeline::{build_dispatch_pipeline, DispatchPipeline};
pub use request::{Dispatch, DispatchConfig, DispatchError, DispatchMode};
