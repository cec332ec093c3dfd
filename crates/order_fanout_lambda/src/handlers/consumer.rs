use std::str::FromStr;

use order_fanout_core::artifacts::derive_artifact;
use order_fanout_core::contract::{
    resolve_correlation_id, BatchReport, ContractError, OrderMessage, QueueRecord,
};
use order_fanout_core::failure::should_fail;
use order_fanout_core::role::Role;
use order_fanout_core::storage_keys::TraceStep;
use serde_json::json;

use crate::adapters::object_store::{put_json, StoreError};
use crate::handlers::stress::StressSimulator;
use crate::handlers::HandlerDeps;
use crate::trace::TraceRecorder;

/// How a failed message is surfaced to the queue subsystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportingMode {
    /// Only failed message ids are returned for redelivery.
    #[default]
    PartialFailure,
    /// The first failure aborts the invocation and the whole batch is redelivered.
    FailFast,
}

impl ReportingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PartialFailure => "partial",
            Self::FailFast => "fail_fast",
        }
    }
}

impl FromStr for ReportingMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "partial" | "partial_failure" => Ok(Self::PartialFailure),
            "fail_fast" | "fail-fast" => Ok(Self::FailFast),
            other => Err(format!(
                "unknown reporting mode '{other}', expected 'partial' or 'fail_fast'"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MessageError {
    #[error("forced failure (demo): {role}")]
    Forced { role: Role },
    #[error("simulated failure: roll {roll:.3} below FAIL_RATIO {fail_ratio}")]
    Simulated { roll: f64, fail_ratio: f64 },
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Raised in fail-fast mode so the runtime reports the whole batch as failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("message '{message_id}' failed, aborting batch of {batch_size}: {source}")]
pub struct BatchError {
    pub message_id: String,
    pub batch_size: usize,
    #[source]
    pub source: MessageError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageOutcome {
    pub message_id: String,
    pub correlation_id: String,
    pub artifact_key: Option<String>,
}

/// Consumes batches delivered to one role's queue.
///
/// Messages are handled one at a time in delivery order. Every terminal state
/// leaves a trace artifact behind: `received` then `processed` on success,
/// a forced `received` step for injected failures, and an `error` step for
/// anything that goes wrong after the message was received.
pub struct BatchConsumer<'a> {
    role: Role,
    mode: ReportingMode,
    deps: HandlerDeps<'a>,
    stress: Option<&'a StressSimulator<'a>>,
}

impl<'a> BatchConsumer<'a> {
    pub fn new(role: Role, mode: ReportingMode, deps: HandlerDeps<'a>) -> Self {
        Self {
            role,
            mode,
            deps,
            stress: None,
        }
    }

    pub fn with_stress(mut self, stress: &'a StressSimulator<'a>) -> Self {
        self.stress = Some(stress);
        self
    }

    pub fn handle_batch(&self, records: &[QueueRecord]) -> Result<BatchReport, BatchError> {
        let component = self.role.as_str();
        self.deps.log.info(
            component,
            "batch_received",
            json!({ "records": records.len(), "mode": self.mode.as_str() }),
        );

        let mut failed_ids = Vec::new();
        for record in records {
            if let Err(error) = self.process_record(record) {
                if self.mode == ReportingMode::FailFast {
                    self.deps.log.error(
                        component,
                        "batch_aborted",
                        json!({
                            "message_id": record.message_id.clone(),
                            "records": records.len(),
                            "error": error.to_string(),
                        }),
                    );
                    return Err(BatchError {
                        message_id: record.message_id.clone(),
                        batch_size: records.len(),
                        source: error,
                    });
                }
                failed_ids.push(record.message_id.clone());
            }
        }

        self.deps.log.info(
            component,
            "batch_completed",
            json!({
                "records": records.len(),
                "processed": records.len() - failed_ids.len(),
                "failed": failed_ids.clone(),
            }),
        );
        Ok(BatchReport::from_failed_ids(failed_ids))
    }

    pub fn process_record(&self, record: &QueueRecord) -> Result<MessageOutcome, MessageError> {
        let component = self.role.as_str();
        let message = OrderMessage::decode(&record.body);
        let correlation_id = resolve_correlation_id(&message, self.deps.clock.now_millis());
        let recorder = TraceRecorder::new(self.deps.store, self.deps.clock);

        if should_fail(self.role.as_str(), &message) {
            recorder.record(
                &correlation_id,
                TraceStep::received(self.role),
                json!({ "forced": true, "message": message.document() }),
            )?;
            self.deps.log.warn(
                component,
                "message_forced_fail",
                json!({
                    "message_id": record.message_id.clone(),
                    "correlation_id": correlation_id,
                }),
            );
            return Err(MessageError::Forced { role: self.role });
        }

        match self.process_message(record, &message, &correlation_id, &recorder) {
            Ok(outcome) => {
                self.deps.log.info(
                    component,
                    "message_processed",
                    json!({
                        "message_id": outcome.message_id.clone(),
                        "correlation_id": outcome.correlation_id.clone(),
                        "order_id": message.order_id.clone(),
                        "s3key": outcome.artifact_key.clone(),
                    }),
                );
                Ok(outcome)
            }
            Err(error) => {
                let mut detail = json!({ "error": error.to_string(), "body": record.body.clone() });
                if matches!(error, MessageError::Simulated { .. }) {
                    detail["simulated"] = json!(true);
                }
                if let Err(trace_error) =
                    recorder.record(&correlation_id, TraceStep::error(self.role), detail)
                {
                    self.deps.log.error(
                        component,
                        "trace_write_failed",
                        json!({
                            "correlation_id": correlation_id.clone(),
                            "error": trace_error.to_string(),
                        }),
                    );
                }
                self.deps.log.error(
                    component,
                    "message_failed",
                    json!({
                        "message_id": record.message_id.clone(),
                        "correlation_id": correlation_id,
                        "error": error.to_string(),
                    }),
                );
                Err(error)
            }
        }
    }

    fn process_message(
        &self,
        record: &QueueRecord,
        message: &OrderMessage,
        correlation_id: &str,
        recorder: &TraceRecorder<'_>,
    ) -> Result<MessageOutcome, MessageError> {
        recorder.record(
            correlation_id,
            TraceStep::received(self.role),
            json!({
                "receiveCount": record.receive_count,
                "orderId": message.order_id.clone(),
                "eventType": message.event_type.clone(),
                "message": message.document(),
            }),
        )?;

        if let Some(stress) = self.stress {
            stress.disturb()?;
        }

        let artifact = derive_artifact(self.role, message, correlation_id)?;
        if let Some(artifact) = &artifact {
            put_json(self.deps.store, &artifact.key, &artifact.body)?;
        }
        let artifact_key = artifact.as_ref().map(|artifact| artifact.key.clone());

        recorder.record(
            correlation_id,
            TraceStep::processed(self.role),
            json!({
                "s3key": artifact_key.clone(),
                "artifact": artifact.map(|artifact| artifact.body),
            }),
        )?;

        Ok(MessageOutcome {
            message_id: record.message_id.clone(),
            correlation_id: correlation_id.to_string(),
            artifact_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::adapters::log_sink::LogLevel;
    use crate::handlers::stress::StressSettings;
    use crate::test_helpers::{
        queue_record, FixedClock, MemoryObjectStore, RecordingLogSink, RecordingPause,
        ScriptedRandomness,
    };

    struct Fixture {
        store: MemoryObjectStore,
        clock: FixedClock,
        log: RecordingLogSink,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_store(MemoryObjectStore::new())
        }

        fn with_store(store: MemoryObjectStore) -> Self {
            Self {
                store,
                clock: FixedClock::at(1_700_000_000_000),
                log: RecordingLogSink::new(),
            }
        }

        fn deps(&self) -> HandlerDeps<'_> {
            HandlerDeps {
                store: &self.store,
                clock: &self.clock,
                log: &self.log,
            }
        }
    }

    fn order(correlation_id: &str, order_id: &str, extra: Value) -> String {
        let mut body = json!({
            "correlationId": correlation_id,
            "orderId": order_id,
            "eventType": "OrderPlaced",
            "product": "X",
            "quantity": 2,
            "price": 9.99
        });
        if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), extra) {
            body.extend(extra);
        }
        body.to_string()
    }

    #[test]
    fn fulfillment_writes_received_order_and_processed() {
        let fixture = Fixture::new();
        let consumer = BatchConsumer::new(
            Role::Fulfillment,
            ReportingMode::PartialFailure,
            fixture.deps(),
        );

        let response = consumer
            .handle_batch(&[queue_record("m-1", &order("c1", "o1", json!({})))])
            .expect("partial mode never aborts");

        assert!(response.is_empty());
        assert_eq!(
            fixture.store.keys(),
            vec![
                "orders/o1.json",
                "traces/c1/10-fulfillment-received.json",
                "traces/c1/20-fulfillment-processed.json",
            ]
        );
        let processed = fixture
            .store
            .json("traces/c1/20-fulfillment-processed.json")
            .expect("processed step exists");
        assert_eq!(processed["s3key"], json!("orders/o1.json"));
        assert_eq!(processed["captureTimeMillis"], json!(1_700_000_000_000_i64));
    }

    #[test]
    fn received_step_carries_receive_count() {
        let fixture = Fixture::new();
        let consumer =
            BatchConsumer::new(Role::Analytics, ReportingMode::PartialFailure, fixture.deps());
        let mut record = queue_record("m-1", &order("c1", "o1", json!({})));
        record.receive_count = 4;

        consumer.process_record(&record).expect("message should process");

        let received = fixture
            .store
            .json("traces/c1/11-analytics-received.json")
            .expect("received step exists");
        assert_eq!(received["receiveCount"], json!(4));
        assert_eq!(received["orderId"], json!("o1"));
        assert_eq!(received["message"]["product"], json!("X"));
        assert!(fixture
            .store
            .json("analytics/OrderPlaced/o1.json")
            .is_some());
    }

    #[test]
    fn forced_failure_only_records_received_step() {
        let fixture = Fixture::new();
        let consumer =
            BatchConsumer::new(Role::Shipping, ReportingMode::PartialFailure, fixture.deps());

        let error = consumer
            .process_record(&queue_record(
                "m-1",
                &order("c1", "o1", json!({"forceFail": "shipping"})),
            ))
            .expect_err("forced failure should fail");

        assert_eq!(
            error,
            MessageError::Forced {
                role: Role::Shipping
            }
        );
        assert_eq!(
            fixture.store.keys(),
            vec!["traces/c1/12-shipping-received.json"]
        );
        let received = fixture
            .store
            .json("traces/c1/12-shipping-received.json")
            .expect("forced step exists");
        assert_eq!(received["forced"], json!(true));
        assert!(fixture
            .log
            .events()
            .contains(&(LogLevel::Warn, "message_forced_fail".to_string())));
    }

    #[test]
    fn force_fail_for_other_role_is_ignored() {
        let fixture = Fixture::new();
        let consumer =
            BatchConsumer::new(Role::Analytics, ReportingMode::PartialFailure, fixture.deps());

        let response = consumer
            .handle_batch(&[queue_record(
                "m-1",
                &order("c1", "o1", json!({"forceFail": ["fulfillment", "shipping"]})),
            )])
            .expect("partial mode never aborts");

        assert!(response.is_empty());
        assert!(fixture
            .store
            .json("traces/c1/21-analytics-processed.json")
            .is_some());
    }

    #[test]
    fn partial_mode_reports_only_failed_ids() {
        let fixture = Fixture::new();
        let consumer = BatchConsumer::new(
            Role::Fulfillment,
            ReportingMode::PartialFailure,
            fixture.deps(),
        );

        let response = consumer
            .handle_batch(&[
                queue_record("m-1", &order("c1", "o1", json!({}))),
                queue_record("m-2", &order("c2", "o2", json!({"forceFail": "all"}))),
                queue_record("m-3", &order("c3", "o3", json!({}))),
            ])
            .expect("partial mode never aborts");

        assert_eq!(response.failed_ids(), vec!["m-2"]);
        assert!(fixture.store.json("orders/o1.json").is_some());
        assert!(fixture.store.json("orders/o2.json").is_none());
        assert!(fixture.store.json("orders/o3.json").is_some());
        assert!(fixture
            .store
            .json("traces/c2/20-fulfillment-processed.json")
            .is_none());
        let processed = fixture
            .store
            .keys()
            .into_iter()
            .filter(|key| key.ends_with("/20-fulfillment-processed.json"))
            .count();
        assert_eq!(processed, 2);
    }

    #[test]
    fn fail_fast_mode_aborts_on_first_failure() {
        let fixture = Fixture::new();
        let consumer =
            BatchConsumer::new(Role::Fulfillment, ReportingMode::FailFast, fixture.deps());

        let error = consumer
            .handle_batch(&[
                queue_record("m-1", &order("c1", "o1", json!({"forceFail": true}))),
                queue_record("m-2", &order("c2", "o2", json!({}))),
            ])
            .expect_err("fail-fast should abort the batch");

        assert_eq!(error.message_id, "m-1");
        assert_eq!(error.batch_size, 2);
        assert!(fixture.store.keys().iter().all(|key| !key.contains("c2")));
    }

    #[test]
    fn malformed_body_is_processed_as_opaque_payload() {
        let fixture = Fixture::new();
        let consumer = BatchConsumer::new(
            Role::Fulfillment,
            ReportingMode::PartialFailure,
            fixture.deps(),
        );

        let outcome = consumer
            .process_record(&queue_record("m-1", "{not json"))
            .expect("opaque payloads still process");

        assert_eq!(outcome.correlation_id, "c-1700000000000");
        assert_eq!(outcome.artifact_key.as_deref(), Some("orders/no-id.json"));
        let received = fixture
            .store
            .json("traces/c-1700000000000/10-fulfillment-received.json")
            .expect("received step exists");
        assert_eq!(received["message"], json!({"raw": "{not json"}));
    }

    #[test]
    fn storage_failure_records_error_step_with_raw_body() {
        let store = MemoryObjectStore::new().failing_writes_starting_with("orders/");
        let fixture = Fixture::with_store(store);
        let consumer = BatchConsumer::new(
            Role::Fulfillment,
            ReportingMode::PartialFailure,
            fixture.deps(),
        );
        let body = order("c1", "o1", json!({}));

        let response = consumer
            .handle_batch(&[queue_record("m-1", &body)])
            .expect("partial mode never aborts");

        assert_eq!(response.failed_ids(), vec!["m-1"]);
        let error = fixture
            .store
            .json("traces/c1/96-fulfillment-error.json")
            .expect("error step exists");
        assert_eq!(error["body"], json!(body));
        assert!(error["error"]
            .as_str()
            .expect("error detail is text")
            .contains("orders/o1.json"));
        assert!(fixture
            .store
            .json("traces/c1/20-fulfillment-processed.json")
            .is_none());
    }

    #[test]
    fn invalid_quantity_fails_after_received() {
        let fixture = Fixture::new();
        let consumer = BatchConsumer::new(
            Role::Fulfillment,
            ReportingMode::PartialFailure,
            fixture.deps(),
        );

        let error = consumer
            .process_record(&queue_record(
                "m-1",
                &order("c1", "o1", json!({"quantity": "a dozen"})),
            ))
            .expect_err("invalid quantity should fail");

        assert!(matches!(error, MessageError::Contract(_)));
        assert_eq!(
            fixture.store.keys(),
            vec![
                "traces/c1/10-fulfillment-received.json",
                "traces/c1/96-fulfillment-error.json",
            ]
        );
    }

    #[test]
    fn error_step_write_failure_is_logged_and_message_still_fails() {
        let store = MemoryObjectStore::new().failing_writes_ending_with(".json");
        let fixture = Fixture::with_store(store);
        let consumer =
            BatchConsumer::new(Role::Shipping, ReportingMode::PartialFailure, fixture.deps());

        let error = consumer
            .process_record(&queue_record("m-1", &order("c1", "o1", json!({}))))
            .expect_err("store is down");

        assert!(matches!(error, MessageError::Store(_)));
        let events = fixture.log.events();
        assert!(events.contains(&(LogLevel::Error, "trace_write_failed".to_string())));
        assert!(events.contains(&(LogLevel::Error, "message_failed".to_string())));
    }

    #[test]
    fn stress_worker_traces_simulated_failures() {
        let fixture = Fixture::new();
        let randomness = ScriptedRandomness::new(vec![0.9, 0.1], 0);
        let pause = RecordingPause::new();
        let stress = StressSimulator::new(StressSettings::new(0.5, 10, 0), &randomness, &pause);
        let consumer =
            BatchConsumer::new(Role::Stress, ReportingMode::PartialFailure, fixture.deps())
                .with_stress(&stress);

        let response = consumer
            .handle_batch(&[
                queue_record("m-1", &order("c1", "o1", json!({}))),
                queue_record("m-2", &order("c2", "o2", json!({}))),
            ])
            .expect("partial mode never aborts");

        assert_eq!(response.failed_ids(), vec!["m-2"]);
        assert_eq!(pause.pauses().len(), 2);

        let processed = fixture
            .store
            .json("traces/c1/23-stress-processed.json")
            .expect("processed step exists");
        assert_eq!(processed["s3key"], Value::Null);

        let error = fixture
            .store
            .json("traces/c2/99-stress-error.json")
            .expect("error step exists");
        assert_eq!(error["simulated"], json!(true));
    }

    #[test]
    fn reporting_mode_parses_known_names() {
        assert_eq!("partial".parse(), Ok(ReportingMode::PartialFailure));
        assert_eq!("FAIL-FAST".parse(), Ok(ReportingMode::FailFast));
        assert!("sometimes".parse::<ReportingMode>().is_err());
    }
}
