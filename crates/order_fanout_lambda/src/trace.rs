//! Append-only trace log kept per correlation id in the object store.

use std::collections::{BTreeMap, BTreeSet};

use order_fanout_core::role::Role;
use order_fanout_core::storage_keys::{
    decode_key_segment, step_name_from_key, trace_object_key, trace_prefix, Phase, TraceStep,
    TRACE_PREFIX,
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::adapters::clock::Clock;
use crate::adapters::object_store::{put_json, ObjectStore, StoreError};

pub const CAPTURE_TIME_FIELD: &str = "captureTimeMillis";

pub struct TraceRecorder<'a> {
    store: &'a dyn ObjectStore,
    clock: &'a dyn Clock,
}

impl<'a> TraceRecorder<'a> {
    pub fn new(store: &'a dyn ObjectStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Persists `{captureTimeMillis, ...payload}` under the step key and
    /// returns that key. Non-object payloads are nested under `payload`.
    /// Write failures are returned to the caller untouched.
    pub fn record(
        &self,
        correlation_id: &str,
        step: TraceStep,
        payload: Value,
    ) -> Result<String, StoreError> {
        let mut artifact = Map::new();
        artifact.insert(
            CAPTURE_TIME_FIELD.to_string(),
            Value::from(self.clock.now_millis()),
        );
        match payload {
            Value::Object(fields) => artifact.extend(fields),
            Value::Null => {}
            other => {
                artifact.insert("payload".to_string(), other);
            }
        }

        let key = trace_object_key(correlation_id, step);
        put_json(self.store, &key, &Value::Object(artifact))?;
        Ok(key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub key: String,
    pub step_name: String,
    #[serde(skip)]
    pub step: Option<TraceStep>,
    /// `None` when the object is missing or is not valid JSON.
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoleProgress {
    pub received: bool,
    pub processed: bool,
    pub failed: bool,
    pub dead_lettered: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TraceSummary {
    pub correlation_id: String,
    pub published: bool,
    pub routed: bool,
    pub roles: BTreeMap<Role, RoleProgress>,
    pub dead_lettered: bool,
}

/// Reads trace logs back to reconstruct the cross-role timeline of an order.
pub struct TraceReader<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> TraceReader<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    pub fn correlation_ids(&self) -> Result<Vec<String>, StoreError> {
        let root = format!("{TRACE_PREFIX}/");
        let ids: BTreeSet<String> = self
            .store
            .list_keys(&root)?
            .iter()
            .filter_map(|key| key.strip_prefix(&root)?.split('/').next())
            .filter(|id| !id.is_empty())
            .map(decode_key_segment)
            .collect();
        Ok(ids.into_iter().collect())
    }

    /// Steps in timeline order; step codes make lexicographic order match.
    pub fn timeline(&self, correlation_id: &str) -> Result<Vec<TraceEntry>, StoreError> {
        let mut keys = self.store.list_keys(&trace_prefix(correlation_id))?;
        keys.sort();

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(step_name) = step_name_from_key(&key).map(str::to_string) else {
                continue;
            };
            let data = self
                .store
                .read_object(&key)?
                .and_then(|body| serde_json::from_slice::<Value>(&body).ok());
            entries.push(TraceEntry {
                step: TraceStep::parse(&step_name),
                step_name,
                key,
                data,
            });
        }
        Ok(entries)
    }

    pub fn summary(&self, correlation_id: &str) -> Result<TraceSummary, StoreError> {
        let mut summary = TraceSummary {
            correlation_id: correlation_id.to_string(),
            ..TraceSummary::default()
        };

        for key in self.store.list_keys(&trace_prefix(correlation_id))? {
            let Some(step) = step_name_from_key(&key).and_then(TraceStep::parse) else {
                continue;
            };
            match step {
                TraceStep::Published => summary.published = true,
                TraceStep::Routes => summary.routed = true,
                TraceStep::DeadLetter => summary.dead_lettered = true,
                TraceStep::Role { role, phase } => {
                    let progress = summary.roles.entry(role).or_default();
                    match phase {
                        Phase::Received => progress.received = true,
                        Phase::Processed => progress.processed = true,
                        Phase::Error => progress.failed = true,
                        Phase::DeadLettered => progress.dead_lettered = true,
                    }
                }
            }
        }
        Ok(summary)
    }
}
