//! Diff-on-poll value monitor.
//!
//! Each watched identifier has one poller task that reads its source on an
//! interval and emits a [`ValueChange`] when the value differs from the
//! cached one. The value read at start is cached without an event.

use crate::errors::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Something whose current value can be read
pub trait ValueSource: Send + Sync + 'static {
    /// Reads the current value.
    fn read(&self) -> Result<String>;
}

/// Reads the trimmed content of a file
#[derive(Debug, Clone)]
pub struct FileValueSource {
    path: PathBuf,
}

impl FileValueSource {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ValueSource for FileValueSource {
    fn read(&self) -> Result<String> {
        Ok(std::fs::read_to_string(&self.path)?.trim().to_string())
    }
}

/// A detected change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChange {
    pub identifier: String,
    pub previous: Option<String>,
    pub new: String,
    pub timestamp: DateTime<Utc>,
}

struct Poller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Shortest polling interval; shorter requests are raised to this
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

type Cache = Arc<Mutex<HashMap<String, String>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs and tracks pollers
pub struct ValueMonitor {
    cache: Cache,
    pollers: Mutex<HashMap<String, Poller>>,
    events: UnboundedSender<ValueChange>,
}

impl ValueMonitor {
    /// Creates a monitor and the receiver its change events go to.
    #[must_use]
    pub fn new() -> (Self, UnboundedReceiver<ValueChange>) {
        let (events, rx) = mpsc::unbounded_channel();
        let monitor = Self {
            cache: Arc::new(Mutex::new(HashMap::new())),
            pollers: Mutex::new(HashMap::new()),
            events,
        };
        (monitor, rx)
    }

    /// Starts polling `source` as `identifier`, replacing any poller already
    /// running under that identifier. `interval` is at least
    /// [`MIN_POLL_INTERVAL`].
    pub fn start<S: ValueSource>(&self, identifier: &str, source: S, interval: Duration) {
        self.stop(identifier);
        let interval = interval.max(MIN_POLL_INTERVAL);

        match source.read() {
            Ok(initial) => {
                lock(&self.cache).insert(identifier.to_string(), initial);
            }
            Err(e) => warn!(identifier, error = %e, "Initial read failed"),
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll(
            identifier.to_string(),
            source,
            interval,
            Arc::clone(&self.cache),
            self.events.clone(),
            cancel.clone(),
        ));

        lock(&self.pollers).insert(identifier.to_string(), Poller { cancel, handle });
        info!(identifier, interval_ms = interval.as_millis(), "Started monitoring");
    }

    /// Stops the poller of `identifier` and forgets its cached value.
    pub fn stop(&self, identifier: &str) {
        if let Some(poller) = lock(&self.pollers).remove(identifier) {
            poller.cancel.cancel();
            poller.handle.abort();
            info!(identifier, "Stopped monitoring");
        }
        lock(&self.cache).remove(identifier);
    }

    /// Stops every poller.
    pub fn stop_all(&self) {
        let identifiers: Vec<String> = lock(&self.pollers).keys().cloned().collect();
        for identifier in identifiers {
            self.stop(&identifier);
        }
    }

    /// Whether a poller is running for `identifier`.
    #[must_use]
    pub fn is_running(&self, identifier: &str) -> bool {
        lock(&self.pollers).contains_key(identifier)
    }

    /// Last value seen for `identifier`.
    #[must_use]
    pub fn current_value(&self, identifier: &str) -> Option<String> {
        lock(&self.cache).get(identifier).cloned()
    }
}

impl Drop for ValueMonitor {
    fn drop(&mut self) {
        self.stop_all();
    }
}

async fn poll<S: ValueSource>(
    identifier: String,
    source: S,
    interval: Duration,
    cache: Cache,
    events: UnboundedSender<ValueChange>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let current = match source.read() {
            Ok(value) => value,
            Err(e) => {
                debug!(identifier = %identifier, error = %e, "Read failed");
                continue;
            }
        };

        let previous = {
            let mut cache = lock(&cache);
            if cache.get(&identifier) == Some(&current) {
                continue;
            }
            cache.insert(identifier.clone(), current.clone())
        };

        debug!(identifier = %identifier, ?previous, new = %current, "Value changed");
        let change = ValueChange {
            identifier: identifier.clone(),
            previous,
            new: current,
            timestamp: Utc::now(),
        };
        if events.send(change).is_err() {
            break;
        }
    }
}
