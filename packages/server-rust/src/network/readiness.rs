//! Node readiness state with in-flight dispatch tracking.
//!
//! Readiness flips only in response to core lifecycle events:
//! `SystemReady` makes the node ready, `ShuttingDown` makes it not ready.
//! The state lives in an `ArcSwap` so probes read it without locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use streamgate_core::LifecycleEvent;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::observability::catalog::NODE_READY;

/// Whether the node accepts traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Readiness {
    #[default]
    NotReady,
    Ready,
}

impl Readiness {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotReady => "not-ready",
            Self::Ready => "ready",
        }
    }
}

/// Owns node readiness, the listener shutdown signal, and the in-flight count.
#[derive(Debug)]
pub struct ReadinessController {
    shutdown_signal: watch::Sender<bool>,
    in_flight: Arc<AtomicU64>,
    readiness: ArcSwap<Readiness>,
}

impl ReadinessController {
    /// Creates a controller in the `NotReady` state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            shutdown_signal: tx,
            in_flight: Arc::new(AtomicU64::new(0)),
            readiness: ArcSwap::from_pointee(Readiness::NotReady),
        }
    }

    /// Apply one lifecycle event. Idempotent.
    pub fn apply(&self, event: LifecycleEvent) {
        let next = match event {
            LifecycleEvent::SystemReady => Readiness::Ready,
            LifecycleEvent::ShuttingDown => Readiness::NotReady,
        };
        let previous = *self.readiness.swap(Arc::new(next));
        if previous != next {
            tracing::info!(from = previous.as_str(), to = next.as_str(), "node readiness changed");
        }
        metrics::gauge!(NODE_READY).set(if next == Readiness::Ready { 1.0 } else { 0.0 });
    }

    #[must_use]
    pub fn readiness(&self) -> Readiness {
        **self.readiness.load()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.readiness() == Readiness::Ready
    }

    /// Apply lifecycle events from the core until its channel closes.
    pub fn spawn_lifecycle_listener(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<LifecycleEvent>,
    ) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => controller.apply(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "lifecycle listener lagged behind the core");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!("lifecycle event stream closed");
        })
    }

    /// Receiver notified when the listeners must stop accepting connections.
    #[must_use]
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_signal.subscribe()
    }

    /// Signal every listener to stop accepting new connections.
    ///
    /// Readiness is left alone; only the core's `ShuttingDown` event clears it.
    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_signal.send(true);
    }

    /// RAII guard counting one in-flight dispatch.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Waits for in-flight dispatches to finish, up to `timeout`.
    ///
    /// Returns `false` if the timeout expired first.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.in_flight.load(Ordering::Relaxed) == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Default for ReadinessController {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter when dropped, including on panic unwind.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_not_ready() {
        let controller = ReadinessController::new();
        assert_eq!(controller.readiness(), Readiness::NotReady);
        assert_eq!(controller.in_flight_count(), 0);
    }

    #[test]
    fn lifecycle_events_drive_readiness() {
        let controller = ReadinessController::new();

        controller.apply(LifecycleEvent::SystemReady);
        assert!(controller.is_ready());

        controller.apply(LifecycleEvent::SystemReady);
        assert!(controller.is_ready());

        controller.apply(LifecycleEvent::ShuttingDown);
        assert_eq!(controller.readiness(), Readiness::NotReady);
    }

    #[test]
    fn trigger_shutdown_does_not_touch_readiness() {
        let controller = ReadinessController::new();
        controller.apply(LifecycleEvent::SystemReady);
        controller.trigger_shutdown();
        assert!(controller.is_ready());
    }

    #[tokio::test]
    async fn listener_applies_broadcast_events() {
        let controller = Arc::new(ReadinessController::new());
        let (tx, rx) = broadcast::channel(8);
        let handle = controller.spawn_lifecycle_listener(rx);

        tx.send(LifecycleEvent::SystemReady).unwrap();
        tx.send(LifecycleEvent::ShuttingDown).unwrap();
        tx.send(LifecycleEvent::SystemReady).unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(controller.is_ready());
    }

    #[test]
    fn in_flight_guard_increments_and_decrements() {
        let controller = ReadinessController::new();

        let first = controller.in_flight_guard();
        let second = controller.in_flight_guard();
        assert_eq!(controller.in_flight_count(), 2);

        drop(first);
        assert_eq!(controller.in_flight_count(), 1);
        drop(second);
        assert_eq!(controller.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_receiver_notified() {
        let controller = ReadinessController::new();
        let mut rx = controller.shutdown_receiver();
        assert!(!*rx.borrow());

        controller.trigger_shutdown();

        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn wait_for_drain_with_active_dispatches() {
        let controller = ReadinessController::new();
        let guard = controller.in_flight_guard();

        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });

        assert!(controller.wait_for_drain(Duration::from_secs(2)).await);
        release.await.unwrap();
    }

    #[tokio::test]
    async fn wait_for_drain_timeout() {
        let controller = ReadinessController::new();
        let _guard = controller.in_flight_guard();
        assert!(!controller.wait_for_drain(Duration::from_millis(50)).await);
    }
}
