// Metrics for lock acquisition and release
// Emitted through the `metrics` facade; nothing is recorded unless a recorder is installed

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

pub const LOCK_ACQUIRED_TOTAL: &str = "casslock_lock_acquired_total";
pub const LOCK_TIMEOUTS_TOTAL: &str = "casslock_lock_timeouts_total";
pub const LOCK_RELEASED_TOTAL: &str = "casslock_lock_released_total";
pub const LOCKS_HELD: &str = "casslock_locks_held";
pub const LOCK_WAIT_SECONDS: &str = "casslock_lock_wait_seconds";
pub const LOCK_HELD_SECONDS: &str = "casslock_lock_held_seconds";

/// Initialize all metric descriptions
/// Should be called once at application startup
pub fn describe_metrics() {
    describe_counter!(LOCK_ACQUIRED_TOTAL, "Total number of locks acquired");
    describe_counter!(
        LOCK_TIMEOUTS_TOTAL,
        "Total number of lock attempts that timed out"
    );
    describe_counter!(LOCK_RELEASED_TOTAL, "Total number of locks released");
    describe_gauge!(LOCKS_HELD, "Number of locks currently held by this process");
    describe_histogram!(
        LOCK_WAIT_SECONDS,
        "Time spent waiting for a lock, in seconds"
    );
    describe_histogram!(LOCK_HELD_SECONDS, "Time a lock was held, in seconds");

    tracing::debug!("Lock metrics described");
}

/// Record a successful acquisition
pub fn record_acquired(table: &str, wait_secs: f64) {
    counter!(LOCK_ACQUIRED_TOTAL, "table" => table.to_string()).increment(1);
    histogram!(LOCK_WAIT_SECONDS, "table" => table.to_string()).record(wait_secs);
    gauge!(LOCKS_HELD).increment(1.0);
}

/// Record an acquisition that ran out of time
pub fn record_timeout(table: &str) {
    counter!(LOCK_TIMEOUTS_TOTAL, "table" => table.to_string()).increment(1);
}

/// Record the release of a held lock
pub fn record_released(table: &str, held_secs: f64) {
    counter!(LOCK_RELEASED_TOTAL, "table" => table.to_string()).increment(1);
    histogram!(LOCK_HELD_SECONDS, "table" => table.to_string()).record(held_secs);
    gauge!(LOCKS_HELD).decrement(1.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use casslock_common::LockSettings;
    use casslock_store::MemoryKeyspace;
    use metrics::{
        Counter, Gauge, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder, SharedString,
        Unit,
    };

    use crate::{BakeryLock, LockContext};

    #[derive(Default)]
    struct Samples(Mutex<Vec<f64>>);

    impl HistogramFn for Samples {
        fn record(&self, value: f64) {
            self.0.lock().unwrap().push(value);
        }
    }

    /// Keeps one handle per metric name, labels ignored
    #[derive(Default)]
    struct TestRecorder {
        counters: Mutex<HashMap<String, Arc<AtomicU64>>>,
        gauges: Mutex<HashMap<String, Arc<AtomicU64>>>,
        histograms: Mutex<HashMap<String, Arc<Samples>>>,
    }

    impl TestRecorder {
        fn counter(&self, name: &str) -> u64 {
            self.counters
                .lock()
                .unwrap()
                .get(name)
                .map_or(0, |c| c.load(Ordering::SeqCst))
        }

        fn gauge(&self, name: &str) -> f64 {
            self.gauges
                .lock()
                .unwrap()
                .get(name)
                .map_or(0.0, |g| f64::from_bits(g.load(Ordering::SeqCst)))
        }

        fn samples(&self, name: &str) -> usize {
            self.histograms
                .lock()
                .unwrap()
                .get(name)
                .map_or(0, |h| h.0.lock().unwrap().len())
        }
    }

    impl Recorder for TestRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            let mut counters = self.counters.lock().unwrap();
            let handle = counters.entry(key.name().to_string()).or_default();
            Counter::from_arc(Arc::clone(handle))
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            let mut gauges = self.gauges.lock().unwrap();
            let handle = gauges.entry(key.name().to_string()).or_default();
            Gauge::from_arc(Arc::clone(handle))
        }

        fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
            let mut histograms = self.histograms.lock().unwrap();
            let handle = histograms.entry(key.name().to_string()).or_default();
            Histogram::from_arc(Arc::clone(handle))
        }
    }

    #[test]
    fn test_lock_metrics_stay_balanced() {
        let recorder = TestRecorder::default();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                let store = Arc::new(MemoryKeyspace::default());
                let settings = LockSettings::default()
                    .with_host_name("web1")
                    .with_lock_timeout_secs(1);
                let first = LockContext::for_process(store.clone(), settings.clone(), 1).unwrap();
                first.add_lock_host("web1").await.unwrap();
                let second = LockContext::for_process(store, settings, 2).unwrap();

                let mut lock = BakeryLock::new(&first).await.unwrap();
                assert!(lock.lock("r").await.unwrap());
                lock.unlock().await.unwrap();
                assert!(lock.lock("r").await.unwrap());

                let mut other = BakeryLock::new(&second).await.unwrap();
                assert!(!other.lock("r").await.unwrap());

                drop(lock);
                tokio::task::yield_now().await;
            })
        });

        assert_eq!(recorder.counter(LOCK_ACQUIRED_TOTAL), 2);
        assert_eq!(recorder.counter(LOCK_RELEASED_TOTAL), 2);
        assert_eq!(recorder.counter(LOCK_TIMEOUTS_TOTAL), 1);
        assert_eq!(recorder.gauge(LOCKS_HELD), 0.0);
        assert_eq!(recorder.samples(LOCK_WAIT_SECONDS), 2);
        assert_eq!(recorder.samples(LOCK_HELD_SECONDS), 2);
    }
}
