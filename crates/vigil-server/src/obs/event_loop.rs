//! Scheduler responsiveness sampler.
//!
//! A background task sleeps for `resolution` in a loop and records how late it
//! wakes up. Samples accumulate in a rolling window; each collection pass takes
//! p50/p90/p99 in one step, caches them, and resets the window, so every
//! scrape reflects only the delay accumulated since the previous one.
//!
//! The three gauges are fed by a single batch callback, which keeps the
//! percentile computation independent of gauge callback order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use vigil_core::error::{Result, VigilError};
use vigil_core::Registry;

pub const DELAY_P50: &str = "runtime_event_loop_delay_p50_ms";
pub const DELAY_P90: &str = "runtime_event_loop_delay_p90_ms";
pub const DELAY_P99: &str = "runtime_event_loop_delay_p99_ms";

pub const DEFAULT_RESOLUTION: Duration = Duration::from_millis(10);

// Upper bound on retained samples between two reads; oldest are overwritten.
const MAX_SAMPLES: usize = 1 << 16;

/// Delay percentiles in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DelayPercentiles {
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

/// Ring of delay samples in nanoseconds.
#[derive(Debug, Default)]
struct DelayWindow {
    samples: Vec<u64>,
    next: usize,
}

impl DelayWindow {
    fn record(&mut self, nanos: u64) {
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(nanos);
        } else {
            self.samples[self.next] = nanos;
            self.next = (self.next + 1) % MAX_SAMPLES;
        }
    }

    fn reset(&mut self) {
        self.samples.clear();
        self.next = 0;
    }

    fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn sorted(&self) -> Vec<u64> {
        let mut s = self.samples.clone();
        s.sort_unstable();
        s
    }
}

/// Nearest-rank percentile over sorted samples, in ms. Empty input gives 0.
fn percentile_ms(sorted: &[u64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    let idx = rank.clamp(1, sorted.len()) - 1;
    sorted[idx] as f64 / 1_000_000.0
}

#[derive(Default)]
struct Shared {
    window: Mutex<DelayWindow>,
    last: Mutex<DelayPercentiles>,
}

impl Shared {
    fn record(&self, delay: Duration) {
        let nanos = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
        if let Ok(mut w) = self.window.lock() {
            w.record(nanos);
        }
    }
}

pub struct EventLoopDelaySampler {
    resolution: Duration,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl EventLoopDelaySampler {
    pub fn new(resolution: Duration) -> Self {
        Self {
            resolution: resolution.max(Duration::from_millis(1)),
            shared: Arc::new(Shared::default()),
            task: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    /// Start sampling on the current tokio runtime. Enabling twice is a no-op.
    pub fn enable(&self) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| VigilError::Lifecycle(format!("event loop sampler needs a tokio runtime: {e}")))?;

        let mut g = self
            .task
            .lock()
            .map_err(|_| VigilError::Internal("event loop sampler poisoned".into()))?;
        if g.is_some() {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let resolution = self.resolution;
        *g = Some(handle.spawn(sample_loop(shared, resolution)));
        self.started.store(true, Ordering::Relaxed);

        tracing::info!(resolution_ms = resolution.as_millis() as u64, "event loop delay sampler enabled");
        Ok(())
    }

    /// Stop sampling. No-op when not running.
    pub fn disable(&self) {
        let task = match self.task.lock() {
            Ok(mut g) => g.take(),
            Err(_) => None,
        };
        if let Some(task) = task {
            task.abort();
            tracing::info!("event loop delay sampler disabled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.task.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Whether `enable` ever succeeded.
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }

    /// Feed one delay sample directly.
    pub fn record_delay(&self, delay: Duration) {
        self.shared.record(delay);
    }

    /// Percentile of the current window without resetting it (ms, 0 when empty).
    pub fn percentile(&self, p: f64) -> f64 {
        match self.shared.window.lock() {
            Ok(w) => percentile_ms(&w.sorted(), p),
            Err(_) => 0.0,
        }
    }

    /// Compute p50/p90/p99, cache them and reset the window. With no new
    /// samples (e.g. after `disable`) the cached values are returned.
    pub fn take_percentiles(&self) -> DelayPercentiles {
        let sorted = match self.shared.window.lock() {
            Ok(mut w) if !w.is_empty() => {
                let s = w.sorted();
                w.reset();
                s
            }
            _ => return self.last_percentiles(),
        };

        let p = DelayPercentiles {
            p50: percentile_ms(&sorted, 50.0),
            p90: percentile_ms(&sorted, 90.0),
            p99: percentile_ms(&sorted, 99.0),
        };
        if let Ok(mut last) = self.shared.last.lock() {
            *last = p;
        }
        p
    }

    pub fn last_percentiles(&self) -> DelayPercentiles {
        self.shared.last.lock().map(|g| *g).unwrap_or_default()
    }
}

impl Drop for EventLoopDelaySampler {
    fn drop(&mut self) {
        self.disable();
    }
}

async fn sample_loop(shared: Arc<Shared>, resolution: Duration) {
    loop {
        let start = Instant::now();
        tokio::time::sleep(resolution).await;
        shared.record(start.elapsed().saturating_sub(resolution));
    }
}

/// Register the p50/p90/p99 gauges backed by `sampler`. Nothing is reported
/// until the sampler has been enabled once.
pub fn register_delay_gauges(registry: &Registry, sampler: Arc<EventLoopDelaySampler>) -> Result<()> {
    let p50 = registry.create_observable_gauge(DELAY_P50, "Event loop delay p50", Some("ms"))?;
    let p90 = registry.create_observable_gauge(DELAY_P90, "Event loop delay p90", Some("ms"))?;
    let p99 = registry.create_observable_gauge(DELAY_P99, "Event loop delay p99", Some("ms"))?;

    let (g50, g90, g99) = (p50.clone(), p90.clone(), p99.clone());
    registry.add_batch_callback(&[&p50, &p90, &p99], move |o| {
        if !sampler.has_started() {
            return Ok(());
        }
        let p = sampler.take_percentiles();
        o.observe(&g50, p.p50);
        o.observe(&g90, p.p90);
        o.observe(&g99, p.p99);
        Ok(())
    })
}
