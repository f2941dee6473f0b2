/// Process lifecycle signals emitted by the internal core.
///
/// Only these two events change node readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// The core finished starting and can serve traffic.
    SystemReady,
    /// The core began shutting down.
    ShuttingDown,
}
