//! Garbage-collection pause observation.
//!
//! The host runtime's pause notifications are abstracted behind
//! [`GcPauseSource`]; the observer classifies each pause by kind and flag and
//! records its duration (ms) into a histogram labeled `{kind, flag}`.
//! [`ManualPauseSource`] lets embedders (and tests) feed pauses directly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{Result, VigilError};
use crate::labels::LabelSet;
use crate::registry::Histogram;

pub const KIND_PREFIX: &str = "GC_";
pub const FLAGS_PREFIX: &str = "GC_FLAGS_";
pub const UNKNOWN: &str = "unknown";

/// Well-known pause constants (kinds and flags share one namespace,
/// distinguished by prefix).
pub const DEFAULT_CONSTANTS: &[(&str, u32)] = &[
    ("GC_MINOR", 1),
    ("GC_MAJOR", 4),
    ("GC_INCREMENTAL", 8),
    ("GC_WEAKCB", 16),
    ("GC_FLAGS_NO", 0),
    ("GC_FLAGS_CONSTRUCT_RETAINED", 2),
    ("GC_FLAGS_FORCED", 4),
    ("GC_FLAGS_SYNCHRONOUS_PHANTOM_PROCESSING", 8),
    ("GC_FLAGS_ALL_AVAILABLE_GARBAGE", 16),
    ("GC_FLAGS_ALL_EXTERNAL_MEMORY", 32),
    ("GC_FLAGS_SCHEDULE_IDLE", 64),
];

/// One pause notification from the runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcPauseEvent {
    pub duration: Duration,
    pub kind: u32,
    pub flags: u32,
}

/// Code -> name lookup, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct GcCodeTable {
    kinds: HashMap<u32, String>,
    flags: HashMap<u32, String>,
}

impl GcCodeTable {
    /// Build from a runtime's constant set. Entries starting with
    /// [`FLAGS_PREFIX`] become flags, other [`KIND_PREFIX`] entries become
    /// kinds, anything else is ignored. Names keep the suffix after the prefix.
    pub fn from_constants<'a>(constants: impl IntoIterator<Item = (&'a str, u32)>) -> Self {
        let mut table = Self::default();
        for (name, code) in constants {
            if let Some(flag) = name.strip_prefix(FLAGS_PREFIX) {
                table.flags.insert(code, flag.to_string());
            } else if let Some(kind) = name.strip_prefix(KIND_PREFIX) {
                table.kinds.insert(code, kind.to_string());
            }
        }
        table
    }

    pub fn kind(&self, code: u32) -> &str {
        self.kinds.get(&code).map(String::as_str).unwrap_or(UNKNOWN)
    }

    pub fn flag(&self, code: u32) -> &str {
        self.flags.get(&code).map(String::as_str).unwrap_or(UNKNOWN)
    }
}

pub type PauseCallback = Arc<dyn Fn(GcPauseEvent) + Send + Sync>;

/// Capability interface over a runtime's GC notifications.
pub trait GcPauseSource: Send + Sync {
    fn subscribe(&self, on_pause: PauseCallback) -> Result<()>;
    fn unsubscribe(&self);
}

/// Pause source driven by explicit [`ManualPauseSource::emit`] calls.
#[derive(Default)]
pub struct ManualPauseSource {
    subscriber: Mutex<Option<PauseCallback>>,
}

impl ManualPauseSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a pause to the current subscriber, if any.
    pub fn emit(&self, event: GcPauseEvent) {
        let cb = match self.subscriber.lock() {
            Ok(g) => g.clone(),
            Err(_) => None,
        };
        if let Some(cb) = cb {
            cb(event);
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscriber.lock().map(|g| g.is_some()).unwrap_or(false)
    }
}

impl GcPauseSource for ManualPauseSource {
    fn subscribe(&self, on_pause: PauseCallback) -> Result<()> {
        let mut g = self
            .subscriber
            .lock()
            .map_err(|_| VigilError::Internal("pause source poisoned".into()))?;
        if g.is_some() {
            return Err(VigilError::Lifecycle("pause source already subscribed".into()));
        }
        *g = Some(on_pause);
        Ok(())
    }

    fn unsubscribe(&self) {
        if let Ok(mut g) = self.subscriber.lock() {
            *g = None;
        }
    }
}

/// Records classified pauses into the GC duration histogram.
pub struct GcPauseObserver {
    histogram: Histogram,
    table: Arc<GcCodeTable>,
    source: Mutex<Option<Arc<dyn GcPauseSource>>>,
}

impl GcPauseObserver {
    pub fn new(histogram: Histogram, table: GcCodeTable) -> Self {
        Self {
            histogram,
            table: Arc::new(table),
            source: Mutex::new(None),
        }
    }

    /// Subscribe to `source`. Enabling twice is a no-op.
    pub fn enable(&self, source: Arc<dyn GcPauseSource>) -> Result<()> {
        let mut g = self
            .source
            .lock()
            .map_err(|_| VigilError::Internal("gc observer poisoned".into()))?;
        if g.is_some() {
            return Ok(());
        }

        let histogram = self.histogram.clone();
        let table = Arc::clone(&self.table);
        source.subscribe(Arc::new(move |event| {
            record(&histogram, &table, event);
        }))?;

        *g = Some(source);
        tracing::info!("gc pause observer enabled");
        Ok(())
    }

    /// Disconnect from the source. No-op when never enabled.
    pub fn disable(&self) {
        let source = match self.source.lock() {
            Ok(mut g) => g.take(),
            Err(_) => None,
        };
        if let Some(source) = source {
            source.unsubscribe();
            tracing::info!("gc pause observer disabled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.source.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Classify and record one pause, independent of any subscription.
    pub fn record_pause(&self, event: GcPauseEvent) {
        record(&self.histogram, &self.table, event);
    }
}

fn record(histogram: &Histogram, table: &GcCodeTable, event: GcPauseEvent) {
    let labels = LabelSet::from_pairs([
        ("kind", table.kind(event.kind)),
        ("flag", table.flag(event.flags)),
    ]);
    histogram.record_labels(event.duration.as_secs_f64() * 1_000.0, labels);
}
