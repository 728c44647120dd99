mod common;

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use wavesmith::adapters::mock::FixedProbe;
use wavesmith::domain::models::{compute_limit, ConcurrencyBounds, ResourceSample};
use wavesmith::services::{AdmissionController, AdmissionEvent};

fn controller(min: usize, max: usize, probe: Arc<FixedProbe>) -> AdmissionController {
    AdmissionController::new(ConcurrencyBounds::with_workers(min, max), probe)
}

#[tokio::test]
async fn test_starts_at_max_and_blocks_at_limit() {
    let probe = Arc::new(FixedProbe::idle());
    let admission = controller(1, 2, probe);
    assert_eq!(admission.limit(), 2);

    let first = admission.admit().await;
    let _second = admission.admit().await;
    assert_eq!(admission.in_flight(), 2);
    assert!(admission.try_admit().is_none());

    let waiter = {
        let admission = admission.clone();
        tokio::spawn(async move { admission.admit().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    drop(first);
    let third = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("released slot should admit the waiter")
        .unwrap();
    assert_eq!(admission.in_flight(), 2);
    drop(third);
}

#[tokio::test]
async fn test_critical_load_shrinks_limit_without_preempting() {
    let probe = Arc::new(FixedProbe::idle());
    let admission = controller(1, 4, Arc::clone(&probe));
    let held: Vec<_> = futures::future::join_all((0..4).map(|_| admission.admit())).await;
    assert_eq!(admission.in_flight(), 4);

    probe.set(ResourceSample::new(95.0, 20.0, 0));
    assert_eq!(admission.recompute(), 2);
    // Running work keeps its slots; only new admissions are held back.
    assert_eq!(admission.in_flight(), 4);
    assert!(admission.try_admit().is_none());

    drop(held);
    assert_eq!(admission.in_flight(), 0);
    let a = admission.try_admit().unwrap();
    let _b = admission.try_admit().unwrap();
    assert!(admission.try_admit().is_none());
    drop(a);
}

#[tokio::test]
async fn test_growth_wakes_waiters_and_broadcasts() {
    let probe = Arc::new(FixedProbe::new(ResourceSample::new(95.0, 95.0, 0)));
    let admission = controller(1, 3, Arc::clone(&probe));
    let mut events = admission.subscribe();

    assert_eq!(admission.recompute(), 1);
    match events.recv().await.unwrap() {
        AdmissionEvent::LimitChanged { from, to, .. } => assert_eq!((from, to), (3, 1)),
        other => panic!("unexpected event {other:?}"),
    }

    let _held = admission.admit().await;
    let waiter = {
        let admission = admission.clone();
        tokio::spawn(async move { admission.admit().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    probe.set(ResourceSample::new(10.0, 10.0, 0));
    assert_eq!(admission.recompute(), 2);
    let permit = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("limit growth should admit the waiter")
        .unwrap();
    drop(permit);
}

#[tokio::test]
async fn test_monitor_recomputes_and_stops_on_shutdown() {
    common::init_test_logging();
    let probe = Arc::new(FixedProbe::new(ResourceSample::new(90.0, 10.0, 0)));
    let admission = controller(1, 6, probe);
    let mut events = admission.subscribe();

    let monitor = admission.start(Duration::from_millis(10));
    let first = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, AdmissionEvent::LimitChanged { from: 6, to: 4, .. }));

    admission.shutdown();
    tokio::time::timeout(Duration::from_secs(1), monitor)
        .await
        .expect("monitor should stop")
        .unwrap();
    assert!(admission.limit() >= 1);
}

fn arb_bounds() -> impl Strategy<Value = ConcurrencyBounds> {
    (1usize..8, 0usize..8, 50f32..100.0, 0f32..15.0, 50f32..100.0, 0f32..15.0).prop_map(
        |(min, extra, cpu_warning, cpu_gap, memory_warning, memory_gap)| ConcurrencyBounds {
            min_workers: min,
            max_workers: min + extra,
            cpu_warning,
            cpu_critical: (cpu_warning + cpu_gap).min(100.0),
            memory_warning,
            memory_critical: (memory_warning + memory_gap).min(100.0),
        },
    )
}

fn arb_sample() -> impl Strategy<Value = ResourceSample> {
    (0f32..=100.0, 0f32..=100.0).prop_map(|(cpu, mem)| ResourceSample::new(cpu, mem, 0))
}

proptest! {
    /// Property: the limit always stays within bounds, whatever the input.
    #[test]
    fn prop_limit_within_bounds(bounds in arb_bounds(), sample in arb_sample(), previous in 0usize..20) {
        let next = compute_limit(&sample, previous, &bounds);
        prop_assert!(next >= bounds.min_workers);
        prop_assert!(next <= bounds.max_workers);
    }

    /// Property: a single step never moves an in-bounds limit by more than
    /// two down or one up.
    #[test]
    fn prop_step_size_is_bounded(bounds in arb_bounds(), sample in arb_sample(), offset in 0usize..8) {
        let previous = bounds.clamp(bounds.min_workers + offset);
        let next = compute_limit(&sample, previous, &bounds);
        prop_assert!(next + 2 >= previous);
        prop_assert!(next <= previous + 1);
    }

    /// Property: more load never yields a larger limit.
    #[test]
    fn prop_monotone_in_load(
        bounds in arb_bounds(),
        cpu in 0f32..=100.0,
        mem in 0f32..=100.0,
        extra_cpu in 0f32..=50.0,
        extra_mem in 0f32..=50.0,
        offset in 0usize..8,
    ) {
        let previous = bounds.clamp(bounds.min_workers + offset);
        let light = ResourceSample::new(cpu, mem, 0);
        let heavy = ResourceSample::new((cpu + extra_cpu).min(100.0), (mem + extra_mem).min(100.0), 0);
        prop_assert!(compute_limit(&heavy, previous, &bounds) <= compute_limit(&light, previous, &bounds));
    }

    /// Property: repeated idle samples converge on max_workers.
    #[test]
    fn prop_idle_converges_to_max(bounds in arb_bounds()) {
        let idle = ResourceSample::new(0.0, 0.0, 0);
        let mut limit = bounds.min_workers;
        for _ in 0..=bounds.max_workers {
            limit = compute_limit(&idle, limit, &bounds);
        }
        prop_assert_eq!(limit, bounds.max_workers);
    }
}
