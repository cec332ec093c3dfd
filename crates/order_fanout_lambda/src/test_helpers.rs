//! In-memory fakes for the adapter traits, shared by unit and integration
//! tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use order_fanout_core::contract::{QueueRecord, DEFAULT_RECEIVE_COUNT};
use serde_json::Value;

use crate::adapters::clock::Clock;
use crate::adapters::log_sink::{LogLevel, LogSink};
use crate::adapters::object_store::{ObjectStore, StoreError};
use crate::adapters::pause::Pause;
use crate::adapters::publish::{EventPublisher, PublishError};
use crate::handlers::stress::Randomness;

pub fn queue_record(message_id: &str, body: &str) -> QueueRecord {
    QueueRecord {
        message_id: message_id.to_string(),
        body: body.to_string(),
        receive_count: DEFAULT_RECEIVE_COUNT,
    }
}

enum WriteFailure {
    Prefix(String),
    Suffix(String),
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    failures: Vec<WriteFailure>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_writes_starting_with(mut self, prefix: &str) -> Self {
        self.failures.push(WriteFailure::Prefix(prefix.to_string()));
        self
    }

    pub fn failing_writes_ending_with(mut self, suffix: &str) -> Self {
        self.failures.push(WriteFailure::Suffix(suffix.to_string()));
        self
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .expect("poisoned mutex")
            .keys()
            .cloned()
            .collect()
    }

    pub fn body(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .expect("poisoned mutex")
            .get(key)
            .cloned()
    }

    pub fn json(&self, key: &str) -> Option<Value> {
        self.body(key)
            .map(|body| serde_json::from_slice(&body).expect("stored object should be JSON"))
    }

    pub fn seed(&self, key: &str, body: &[u8]) {
        self.objects
            .lock()
            .expect("poisoned mutex")
            .insert(key.to_string(), body.to_vec());
    }

    pub fn seed_json(&self, key: &str, value: Value) {
        self.seed(key, value.to_string().as_bytes());
    }

    fn rejects(&self, key: &str) -> bool {
        self.failures.iter().any(|failure| match failure {
            WriteFailure::Prefix(prefix) => key.starts_with(prefix.as_str()),
            WriteFailure::Suffix(suffix) => key.ends_with(suffix.as_str()),
        })
    }
}

impl ObjectStore for MemoryObjectStore {
    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), StoreError> {
        if self.rejects(key) {
            return Err(StoreError::Write {
                key: key.to_string(),
                message: "injected write failure".to_string(),
            });
        }
        self.seed(key, body);
        Ok(())
    }

    fn read_object(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.body(key))
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .keys()
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect())
    }
}

pub struct FixedClock {
    now_millis: AtomicI64,
}

impl FixedClock {
    pub fn at(now_millis: i64) -> Self {
        Self {
            now_millis: AtomicI64::new(now_millis),
        }
    }

    pub fn set(&self, now_millis: i64) {
        self.now_millis.store(now_millis, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.now_millis.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub component: String,
    pub event: String,
    pub details: Value,
}

#[derive(Default)]
pub struct RecordingLogSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().expect("poisoned mutex").clone()
    }

    pub fn events(&self) -> Vec<(LogLevel, String)> {
        self.entries()
            .into_iter()
            .map(|entry| (entry.level, entry.event))
            .collect()
    }
}

impl LogSink for RecordingLogSink {
    fn emit(&self, level: LogLevel, component: &str, event: &str, details: Value) {
        self.entries.lock().expect("poisoned mutex").push(LogEntry {
            level,
            component: component.to_string(),
            event: event.to_string(),
            details,
        });
    }
}

#[derive(Default)]
pub struct RecordingPause {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().expect("poisoned mutex").clone()
    }
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) {
        self.pauses.lock().expect("poisoned mutex").push(duration);
    }
}

/// Replays `rolls` in order, repeating the last one once exhausted. Jitter is
/// always `jitter_ms`, capped at the requested maximum.
pub struct ScriptedRandomness {
    rolls: Mutex<Vec<f64>>,
    jitter_ms: u64,
}

impl ScriptedRandomness {
    pub fn new(rolls: Vec<f64>, jitter_ms: u64) -> Self {
        let mut rolls = rolls;
        rolls.reverse();
        Self {
            rolls: Mutex::new(rolls),
            jitter_ms,
        }
    }
}

impl Randomness for ScriptedRandomness {
    fn unit(&self) -> f64 {
        let mut rolls = self.rolls.lock().expect("poisoned mutex");
        if rolls.len() > 1 {
            rolls.pop().unwrap_or(0.0)
        } else {
            rolls.last().copied().unwrap_or(0.0)
        }
    }

    fn up_to(&self, max: u64) -> u64 {
        self.jitter_ms.min(max)
    }
}

pub struct CapturingPublisher {
    target: String,
    fail: bool,
    published: Mutex<Vec<(String, BTreeMap<String, String>)>>,
}

impl CapturingPublisher {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            fail: false,
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(target: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(target)
        }
    }

    pub fn published(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.published.lock().expect("poisoned mutex").clone()
    }
}

impl EventPublisher for CapturingPublisher {
    fn publish(
        &self,
        body: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<String, PublishError> {
        if self.fail {
            return Err(PublishError::Send {
                target: self.target.clone(),
                message: "injected publish failure".to_string(),
            });
        }
        let mut published = self.published.lock().expect("poisoned mutex");
        published.push((body.to_string(), attributes.clone()));
        Ok(format!("msg-{}", published.len()))
    }

    fn target(&self) -> &str {
        &self.target
    }
}
