//! Resource-adaptive admission controller.
//!
//! A counting gate whose size follows system load. The limit is recomputed
//! from fresh telemetry on a fixed interval by a background monitor (see
//! [`AdmissionController::start`]) or on demand via
//! [`AdmissionController::recompute`].
//!
//! Shrinking the limit never evicts running work: permits already handed out
//! stay valid, and new admissions wait until `in_flight` drops below the new
//! limit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::domain::models::{compute_limit, ConcurrencyBounds, ResourceSample};
use crate::domain::ports::ResourceProbe;

/// Admission controller events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AdmissionEvent {
    /// The limit moved after a recomputation
    LimitChanged {
        from: usize,
        to: usize,
        sample: ResourceSample,
    },

    /// The background monitor stopped
    Shutdown,
}

struct Inner {
    bounds: ConcurrencyBounds,
    probe: Arc<dyn ResourceProbe>,
    limit: AtomicUsize,
    in_flight: AtomicUsize,
    slot_freed: Notify,
    last_sample: Mutex<Option<ResourceSample>>,
    event_tx: broadcast::Sender<AdmissionEvent>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Inner {
    fn try_acquire(&self) -> bool {
        let limit = self.limit.load(Ordering::Acquire);
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok()
    }

    fn release(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.slot_freed.notify_waiters();
    }
}

/// Owned admission gate shared by the scheduler and the monitor loop.
///
/// Cloning is cheap; all clones share the same limit and in-flight count.
#[derive(Clone)]
pub struct AdmissionController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("bounds", &self.inner.bounds)
            .field("limit", &self.limit())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl AdmissionController {
    /// Create a controller starting at `max_workers`.
    pub fn new(bounds: ConcurrencyBounds, probe: Arc<dyn ResourceProbe>) -> Self {
        let initial = bounds.clamp(bounds.max_workers);
        let (event_tx, _) = broadcast::channel(64);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            inner: Arc::new(Inner {
                bounds,
                probe,
                limit: AtomicUsize::new(initial),
                in_flight: AtomicUsize::new(0),
                slot_freed: Notify::new(),
                last_sample: Mutex::new(None),
                event_tx,
                shutdown_tx,
            }),
        }
    }

    /// Worker bounds and load thresholds.
    pub fn bounds(&self) -> &ConcurrencyBounds {
        &self.inner.bounds
    }

    /// Current admission limit.
    pub fn limit(&self) -> usize {
        self.inner.limit.load(Ordering::Acquire)
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Most recent resource sample, if any.
    pub fn last_sample(&self) -> Option<ResourceSample> {
        match self.inner.last_sample.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Read telemetry, falling back to a conservative sample on failure.
    pub fn sample(&self) -> ResourceSample {
        match self.inner.probe.sample() {
            Ok(sample) => sample,
            Err(err) => {
                warn!(error = %err, "resource telemetry failed, using conservative sample");
                ResourceSample::conservative()
            }
        }
    }

    /// Sample once and update the limit. Returns the new limit.
    pub fn recompute(&self) -> usize {
        let sample = self.sample();
        match self.inner.last_sample.lock() {
            Ok(mut guard) => *guard = Some(sample),
            Err(poisoned) => *poisoned.into_inner() = Some(sample),
        }

        let previous = self.limit();
        let next = compute_limit(&sample, previous, &self.inner.bounds);
        self.apply_limit(previous, next, sample);

        debug!(
            cpu_percent = sample.cpu_percent,
            memory_percent = sample.memory_percent,
            limit = next,
            in_flight = self.in_flight(),
            "admission limit recomputed"
        );
        next
    }

    /// Force the limit (clamped to bounds). Intended for tests and manual overrides.
    pub fn set_limit(&self, limit: usize) {
        let previous = self.limit();
        let next = self.inner.bounds.clamp(limit);
        let sample = self.last_sample().unwrap_or_else(ResourceSample::conservative);
        self.apply_limit(previous, next, sample);
    }

    fn apply_limit(&self, previous: usize, next: usize, sample: ResourceSample) {
        if previous == next {
            return;
        }
        self.inner.limit.store(next, Ordering::Release);
        info!(from = previous, to = next, "admission limit changed");
        let _ = self.inner.event_tx.send(AdmissionEvent::LimitChanged {
            from: previous,
            to: next,
            sample,
        });
        if next > previous {
            self.inner.slot_freed.notify_waiters();
        }
    }

    /// Wait for a free slot under the current limit.
    pub async fn admit(&self) -> AdmissionPermit {
        loop {
            let notified = self.inner.slot_freed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.try_acquire() {
                return AdmissionPermit {
                    inner: Arc::clone(&self.inner),
                };
            }
            notified.await;
        }
    }

    /// Take a slot only if one is free right now.
    pub fn try_admit(&self) -> Option<AdmissionPermit> {
        self.inner.try_acquire().then(|| AdmissionPermit {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Subscribe to limit changes.
    pub fn subscribe(&self) -> broadcast::Receiver<AdmissionEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Spawn the background monitor recomputing the limit every `period`.
    ///
    /// The handle completes after [`shutdown`](Self::shutdown).
    pub fn start(&self, period: Duration) -> JoinHandle<()> {
        let controller = self.clone();
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            info!(
                interval_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
                min_workers = controller.inner.bounds.min_workers,
                max_workers = controller.inner.bounds.max_workers,
                "admission monitor started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        controller.recompute();
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = controller.inner.event_tx.send(AdmissionEvent::Shutdown);
                        break;
                    }
                }
            }

            info!("admission monitor stopped");
        })
    }

    /// Stop the background monitor.
    pub fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(());
    }
}

/// A held admission slot. Dropping it frees the slot.
pub struct AdmissionPermit {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AdmissionPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionPermit").finish_non_exhaustive()
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.inner.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::FixedProbe;
    use crate::domain::errors::TelemetryError;

    struct FailingProbe;

    impl ResourceProbe for FailingProbe {
        fn sample(&self) -> Result<ResourceSample, TelemetryError> {
            Err(TelemetryError::Unavailable("no /proc".into()))
        }
    }

    fn controller(min: usize, max: usize, probe: Arc<dyn ResourceProbe>) -> AdmissionController {
        AdmissionController::new(ConcurrencyBounds::with_workers(min, max), probe)
    }

    #[test]
    fn test_starts_at_max_workers() {
        let probe = Arc::new(FixedProbe::idle());
        assert_eq!(controller(1, 4, probe).limit(), 4);
    }

    #[test]
    fn test_telemetry_failure_uses_conservative_sample() {
        let ctl = controller(1, 4, Arc::new(FailingProbe));
        assert_eq!(ctl.sample(), ResourceSample::conservative());
        assert_eq!(ctl.recompute(), 4);
    }

    #[test]
    fn test_recompute_follows_probe() {
        let probe = Arc::new(FixedProbe::new(ResourceSample::new(95.0, 20.0, 0)));
        let ctl = controller(1, 4, probe.clone());
        assert_eq!(ctl.recompute(), 2);
        assert_eq!(ctl.recompute(), 1);

        probe.set(ResourceSample::new(10.0, 10.0, 0));
        assert_eq!(ctl.recompute(), 2);
    }

    #[tokio::test]
    async fn test_permits_respect_limit_and_release_on_drop() {
        let ctl = controller(1, 2, Arc::new(FixedProbe::idle()));
        let a = ctl.admit().await;
        let _b = ctl.admit().await;
        assert_eq!(ctl.in_flight(), 2);
        assert!(ctl.try_admit().is_none());

        drop(a);
        assert_eq!(ctl.in_flight(), 1);
        assert!(ctl.try_admit().is_some());
    }

    #[tokio::test]
    async fn test_shrinking_does_not_evict() {
        let ctl = controller(1, 3, Arc::new(FixedProbe::idle()));
        let p1 = ctl.admit().await;
        let p2 = ctl.admit().await;
        let p3 = ctl.admit().await;

        ctl.set_limit(1);
        assert_eq!(ctl.in_flight(), 3);
        assert!(ctl.try_admit().is_none());

        drop(p1);
        drop(p2);
        assert!(ctl.try_admit().is_none());
        drop(p3);
        assert!(ctl.try_admit().is_some());
    }

    #[tokio::test]
    async fn test_waiter_wakes_when_slot_frees() {
        let ctl = controller(1, 1, Arc::new(FixedProbe::idle()));
        let held = ctl.admit().await;

        let waiter = {
            let ctl = ctl.clone();
            tokio::spawn(async move {
                let _permit = ctl.admit().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be admitted")
            .unwrap();
    }

    #[tokio::test]
    async fn test_monitor_broadcasts_changes_and_stops() {
        let probe = Arc::new(FixedProbe::new(ResourceSample::new(99.0, 99.0, 0)));
        let ctl = controller(1, 5, probe);
        let mut events = ctl.subscribe();

        let handle = ctl.start(Duration::from_millis(10));
        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, AdmissionEvent::LimitChanged { from: 5, to: 3, .. }));

        ctl.shutdown();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
