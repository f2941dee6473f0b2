//! Streamgate core: stream identifiers, principals, operations, and the
//! internal command vocabulary shared by every protocol surface.

pub mod context;
pub mod lifecycle;
pub mod messages;
pub mod operation;
pub mod stream_id;
pub mod types;

pub use context::{RequestContext, TransportChannel, TransportKind};
pub use lifecycle::LifecycleEvent;
pub use messages::{Command, CoreReply, DomainFailure, FailureCode, InternalMessage};
pub use operation::{operations, Operation, OperationDefinition};
pub use stream_id::{StreamId, StreamName, StreamNameError};
pub use types::{roles, Principal};
