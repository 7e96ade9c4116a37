//! Integration tests for the async execution bridge.
//!
//! These tests verify the complete bridge workflow including:
//! - Sync/async observational equivalence
//! - Per-handle submission-order serialization
//! - Parallelism across distinct handles
//! - Cancellation before start and cooperative cancellation mid-run
//! - Closed-handle fail-fast behavior
//! - Progress tick delivery

use geobridge::native::NativeError;
use geobridge::{alg, registry, Bridge, BridgeConfig, BridgeError, Dataset};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Test Helpers
// =============================================================================

/// A 64x64 single-band raster whose rows hold `4 * y`.
fn ramp_dataset() -> (Dataset, geobridge::RasterBand) {
    let dataset = Dataset::open_memory_raster(64, 64, 1).unwrap();
    let band = dataset.bands().unwrap().get(1).unwrap();
    for y in 0..64 {
        band.write(0, y, 64, 1, &vec![4.0 * y as f64; 64]).unwrap();
    }
    (dataset, band)
}

async fn with_timeout<T>(fut: impl std::future::Future<Output = T>) -> T {
    tokio::select! {
        result = fut => result,
        _ = tokio::time::sleep(Duration::from_secs(5)) => panic!("test timed out"),
    }
}

// =============================================================================
// Integration Tests
// =============================================================================

#[tokio::test]
async fn test_sync_and_async_paths_agree() {
    let bridge = Bridge::new(BridgeConfig::with_workers(2));
    let (_dataset, band) = ramp_dataset();

    let blocking = alg::checksum_image(&band, None, None).unwrap();
    let bridged = with_timeout(alg::checksum_image_async(&bridge, &band, None).wait())
        .await
        .unwrap();
    assert_eq!(blocking, bridged);
}

#[tokio::test]
async fn test_same_handle_work_runs_in_submission_order() {
    // Plenty of pool capacity; the per-handle lane is what serializes.
    let bridge = Bridge::new(BridgeConfig::with_workers(4));
    let handle = registry().register();
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut pending = Vec::new();
    for tag in 0..4usize {
        let order = Arc::clone(&order);
        pending.push(bridge.submit(&handle, move |_| {
            // The first item dawdles; later items must still wait for it.
            if tag == 0 {
                std::thread::sleep(Duration::from_millis(100));
            }
            order.lock().unwrap().push(tag);
            Ok(())
        }));
    }
    for work in pending {
        with_timeout(work.wait()).await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_distinct_handles_run_in_parallel() {
    let bridge = Bridge::new(BridgeConfig::with_workers(2));
    let slow_handle = registry().register();
    let fast_handle = registry().register();
    let order = Arc::new(Mutex::new(Vec::new()));

    let o = Arc::clone(&order);
    let slow = bridge.submit(&slow_handle, move |_| {
        std::thread::sleep(Duration::from_millis(200));
        o.lock().unwrap().push("slow");
        Ok(())
    });
    let o = Arc::clone(&order);
    let fast = bridge.submit(&fast_handle, move |_| {
        o.lock().unwrap().push("fast");
        Ok(())
    });

    with_timeout(fast.wait()).await.unwrap();
    with_timeout(slow.wait()).await.unwrap();
    // Completion order, not submission order.
    assert_eq!(*order.lock().unwrap(), vec!["fast", "slow"]);
}

#[tokio::test]
async fn test_cancel_before_start_runs_nothing() {
    let bridge = Bridge::new(BridgeConfig::with_workers(1));
    let handle = registry().register();
    let invoked = Arc::new(AtomicUsize::new(0));

    let blocker = bridge.submit(&handle, |_| {
        std::thread::sleep(Duration::from_millis(150));
        Ok(())
    });
    let counter = Arc::clone(&invoked);
    let queued = bridge.submit(&handle, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    queued.cancel();

    let settled = with_timeout(queued.wait()).await;
    assert!(matches!(settled, Err(BridgeError::Cancelled)));
    with_timeout(blocker.wait()).await.unwrap();
    assert_eq!(invoked.load(Ordering::SeqCst), 0, "native side must not run");
}

#[tokio::test]
async fn test_cancel_while_waiting_for_permit_never_runs() {
    // One permit, held by a blocker on its own lane. The victim parks on
    // the semaphore; cancelling it must win even when the permit becomes
    // available in the same instant, so interleave the two repeatedly.
    let bridge = Bridge::new(BridgeConfig::with_workers(1));
    let invoked = Arc::new(AtomicUsize::new(0));

    for _ in 0..50 {
        let blocker_handle = registry().register();
        let victim_handle = registry().register();

        let blocker = bridge.submit(&blocker_handle, |_| {
            std::thread::sleep(Duration::from_millis(10));
            Ok(())
        });
        tokio::time::sleep(Duration::from_millis(2)).await;

        let counter = Arc::clone(&invoked);
        let victim = bridge.submit(&victim_handle, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        tokio::task::yield_now().await;
        victim.cancel();

        assert!(matches!(
            with_timeout(victim.wait()).await,
            Err(BridgeError::Cancelled)
        ));
        with_timeout(blocker.wait()).await.unwrap();
    }
    assert_eq!(
        invoked.load(Ordering::SeqCst),
        0,
        "a cancelled-before-start item must never reach the native side"
    );
}

#[tokio::test]
async fn test_closed_handle_fails_fast_on_both_paths() {
    let bridge = Bridge::new(BridgeConfig::default());
    let dataset = Dataset::open_memory_raster(8, 8, 1).unwrap();
    let band = dataset.bands().unwrap().get(1).unwrap();
    dataset.close();

    let blocking = band.read(0, 0, 4, 4);
    assert!(matches!(blocking, Err(BridgeError::ClosedHandle(_))));

    let bridged = with_timeout(band.read_async(&bridge, 0, 0, 4, 4)).await;
    assert!(matches!(bridged, Err(BridgeError::ClosedHandle(_))));
}

#[tokio::test]
async fn test_progress_ticks_are_ordered_and_nonempty() {
    let bridge = Bridge::new(BridgeConfig::with_workers(2));
    let handle = registry().register();

    let work = bridge.submit(&handle, |sink| {
        for step in 1..=5 {
            sink.report(step as f64 / 5.0, "step");
        }
        Ok(())
    });

    let mut ticks = Vec::new();
    with_timeout(work.wait_with_progress(|tick| {
        ticks.push((tick.seq, tick.fraction));
        ControlFlow::Continue(())
    }))
    .await
    .unwrap();

    assert_eq!(ticks.len(), 5);
    assert!(ticks.windows(2).all(|w| w[0].0 < w[1].0));
    assert!(ticks.windows(2).all(|w| w[0].1 <= w[1].1));
}

#[tokio::test]
async fn test_cooperative_cancellation_stops_a_running_item() {
    let bridge = Bridge::new(BridgeConfig::with_workers(2));
    let handle = registry().register();
    let steps_run = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&steps_run);
    let work = bridge.submit(&handle, move |sink| {
        for step in 0..100 {
            if !sink.report(step as f64 / 100.0, "crunching") {
                return Err(NativeError::interrupted().into());
            }
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    });

    let settled = with_timeout(work.wait_with_progress(|tick| {
        if tick.seq >= 2 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }))
    .await;

    assert!(matches!(settled, Err(BridgeError::Cancelled)));
    assert!(
        steps_run.load(Ordering::SeqCst) < 100,
        "the item must stop before running to completion"
    );
}

#[tokio::test]
async fn test_shutdown_cancels_queued_work() {
    let bridge = Bridge::new(BridgeConfig::with_workers(1));
    let handle = registry().register();

    let blocker = bridge.submit(&handle, |_| {
        std::thread::sleep(Duration::from_millis(150));
        Ok(())
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    let queued = bridge.submit(&handle, |_| Ok(()));
    bridge.shutdown();

    assert!(matches!(
        with_timeout(queued.wait()).await,
        Err(BridgeError::Cancelled)
    ));
    // The in-flight native call cannot be preempted and completes.
    with_timeout(blocker.wait()).await.unwrap();
}
