//! # Diagnostic Log Queue
//!
//! Bounded record of raw request/response pairs grouped by correlation id,
//! meant for support tooling that needs to reconstruct a request's lifecycle.
//!
//! ## Behaviour
//!
//! - Each correlation id owns a timeline of `{captured_at, payload}` records;
//!   adding under an existing id appends instead of overwriting.
//! - When a *new* id arrives while the queue already holds
//!   `max_queue_length` ids, the oldest-inserted id is evicted first
//!   (insertion order, not access order).
//! - After every insert the configured [`LogSink`] receives the full
//!   snapshot. This is the only way to persist the queue externally.
//!
//! The queue is owned by a [`Client`](crate::client::Client) rather than
//! reachable from a global.

use bridge_traits::{Clock, PlatformSendSync, SystemClock};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Receives the full queue snapshot after every insert.
pub trait LogSink: PlatformSendSync {
    fn persist(&self, snapshot: &LogSnapshot);
}

impl<F> LogSink for F
where
    F: Fn(&LogSnapshot) + PlatformSendSync,
{
    fn persist(&self, snapshot: &LogSnapshot) {
        self(snapshot)
    }
}

/// Cloneable handle to a [`LogSink`], usable inside request options.
#[derive(Clone)]
pub struct SharedLogSink(Arc<dyn LogSink>);

impl SharedLogSink {
    pub fn new(sink: impl LogSink + 'static) -> Self {
        Self(Arc::new(sink))
    }

    pub fn from_arc(sink: Arc<dyn LogSink>) -> Self {
        Self(sink)
    }

    pub fn persist(&self, snapshot: &LogSnapshot) {
        self.0.persist(snapshot)
    }
}

impl fmt::Debug for SharedLogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedLogSink")
    }
}

/// One captured payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Capture time, epoch milliseconds
    pub captured_at: i64,
    pub payload: Value,
}

/// Point-in-time copy of the queue, ordered by first insertion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogSnapshot {
    entries: Vec<(String, Vec<LogRecord>)>,
}

impl LogSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Correlation ids, oldest first.
    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&[LogRecord]> {
        self.entries
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, records)| records.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[LogRecord])> {
        self.entries
            .iter()
            .map(|(id, records)| (id.as_str(), records.as_slice()))
    }

    /// JSON form: `{ id: [ {capturedAt, payload}, ... ] }`.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (id, records) in &self.entries {
            let timeline = records
                .iter()
                .map(|record| serde_json::to_value(record).unwrap_or(Value::Null))
                .collect();
            map.insert(id.clone(), Value::Array(timeline));
        }
        Value::Object(map)
    }
}

#[derive(Default)]
struct QueueState {
    order: VecDeque<String>,
    records: HashMap<String, Vec<LogRecord>>,
}

impl QueueState {
    fn snapshot(&self) -> LogSnapshot {
        LogSnapshot {
            entries: self
                .order
                .iter()
                .filter_map(|id| self.records.get(id).map(|r| (id.clone(), r.clone())))
                .collect(),
        }
    }
}

/// Bounded, FIFO-evicting diagnostic log.
pub struct DiagnosticLogQueue {
    max_queue_length: usize,
    sink: Option<SharedLogSink>,
    clock: Arc<dyn Clock>,
    state: Mutex<QueueState>,
}

impl DiagnosticLogQueue {
    /// Queue keeping at most `max_queue_length` correlation ids (at least
    /// one).
    pub fn new(max_queue_length: usize, sink: Option<SharedLogSink>) -> Self {
        Self::with_clock(max_queue_length, sink, Arc::new(SystemClock))
    }

    pub fn with_clock(
        max_queue_length: usize,
        sink: Option<SharedLogSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            max_queue_length: max_queue_length.max(1),
            sink,
            clock,
            state: Mutex::new(QueueState::default()),
        }
    }

    pub fn max_queue_length(&self) -> usize {
        self.max_queue_length
    }

    /// Record `payload` under `correlation_id`, generating a UUID v4 when none
    /// is given. Returns the id used.
    pub fn add(&self, payload: Value, correlation_id: Option<&str>) -> String {
        let id = correlation_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let record = LogRecord {
            captured_at: self.clock.unix_timestamp_millis(),
            payload,
        };

        let snapshot = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if !state.records.contains_key(&id) {
                while state.order.len() >= self.max_queue_length {
                    match state.order.pop_front() {
                        Some(evicted) => {
                            debug!(correlation_id = %evicted, "Evicting oldest log entry");
                            state.records.remove(&evicted);
                        }
                        None => break,
                    }
                }
                state.order.push_back(id.clone());
            }
            state.records.entry(id.clone()).or_default().push(record);
            state.snapshot()
        };

        if let Some(sink) = &self.sink {
            sink.persist(&snapshot);
        }
        id
    }

    pub fn snapshot(&self) -> LogSnapshot {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot()
    }

    /// Number of correlation ids currently held.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<Vec<LogRecord>> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .records
            .get(id)
            .cloned()
    }
}

impl fmt::Debug for DiagnosticLogQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticLogQueue")
            .field("max_queue_length", &self.max_queue_length)
            .field("len", &self.len())
            .finish()
    }
}
