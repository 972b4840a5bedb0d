//! Forwarding of log records to host-registered sinks.
//!
//! Library code logs through the `log` macros. A host that has no logger of
//! its own (a mobile app embedding the library, for instance) registers one
//! or more [`LogSink`]s and calls [`install`] once; every record is then
//! rendered to a line and handed to each sink. With no sinks registered,
//! records are dropped.
//!
//! # Examples
//!
//! ```
//! use arksign::logging::{self, FnSink};
//! use log::LevelFilter;
//! use std::sync::Arc;
//!
//! logging::install(LevelFilter::Info);
//! let id = logging::register_sink(Arc::new(FnSink::new(|line: &str| eprintln!("[arksign] {line}"))));
//! log::info!("hello");
//! logging::unregister_sink(id);
//! ```

use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::{Lazy, OnceCell};
use std::sync::{Arc, RwLock};

/// Receiver of rendered log lines.
///
/// Warnings and errors go to [`LogSink::error`], everything else to
/// [`LogSink::info`]. Sinks may be called from any thread.
pub trait LogSink: Send + Sync {
    fn info(&self, line: &str);
    fn error(&self, line: &str);
}

/// Handle returned by [`register_sink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

/// Adapter turning a single callback into a [`LogSink`].
pub struct FnSink<F> {
    callback: F,
}

impl<F> FnSink<F>
where
    F: Fn(&str) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> LogSink for FnSink<F>
where
    F: Fn(&str) + Send + Sync,
{
    fn info(&self, line: &str) {
        (self.callback)(line)
    }

    fn error(&self, line: &str) {
        (self.callback)(line)
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    sinks: Vec<(SinkId, Arc<dyn LogSink>)>,
}

static SINKS: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::default()));

/// Add a sink. Records logged after this call reach it.
pub fn register_sink(sink: Arc<dyn LogSink>) -> SinkId {
    let mut registry = SINKS.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    let id = SinkId(registry.next_id);
    registry.next_id += 1;
    registry.sinks.push((id, sink));
    id
}

/// Remove a sink. Returns `false` if it was not registered.
pub fn unregister_sink(id: SinkId) -> bool {
    let mut registry = SINKS.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    let before = registry.sinks.len();
    registry.sinks.retain(|(sink_id, _)| *sink_id != id);
    registry.sinks.len() != before
}

/// Number of registered sinks.
pub fn sink_count() -> usize {
    SINKS
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .sinks
        .len()
}

/// Hand one line to every registered sink.
fn dispatch(level: Level, line: &str) {
    // Snapshot so a sink can (un)register without deadlocking.
    let sinks: Vec<Arc<dyn LogSink>> = SINKS
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .sinks
        .iter()
        .map(|(_, sink)| Arc::clone(sink))
        .collect();

    for sink in sinks {
        match level {
            Level::Error | Level::Warn => sink.error(line),
            _ => sink.info(line),
        }
    }
}

struct SinkLogger;

impl Log for SinkLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            dispatch(record.level(), &record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static LOGGER: SinkLogger = SinkLogger;
static INSTALLED: OnceCell<bool> = OnceCell::new();

/// Route `log` records to the registered sinks.
///
/// Sets the global maximum level on every call. Returns `false` if another
/// logger was installed first, in which case records go there instead.
pub fn install(level: LevelFilter) -> bool {
    let installed = *INSTALLED.get_or_init(|| log::set_logger(&LOGGER).is_ok());
    if installed {
        log::set_max_level(level);
    }
    installed
}
