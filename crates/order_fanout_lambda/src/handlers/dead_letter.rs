use order_fanout_core::contract::{resolve_correlation_id, BatchReport, OrderMessage, QueueRecord};
use order_fanout_core::role::Role;
use order_fanout_core::storage_keys::TraceStep;
use serde_json::json;

use crate::adapters::object_store::StoreError;
use crate::handlers::HandlerDeps;
use crate::trace::TraceRecorder;

const COMPONENT: &str = "dlq";

/// Records messages that exhausted their redelivery budget on a role queue.
pub struct DeadLetterRecorder<'a> {
    source_role: Option<Role>,
    deps: HandlerDeps<'a>,
}

impl<'a> DeadLetterRecorder<'a> {
    pub fn new(source_role: Option<Role>, deps: HandlerDeps<'a>) -> Self {
        Self { source_role, deps }
    }

    /// Failed trace writes are the only failure mode and are reported per
    /// record so the dead-letter queue retains them.
    pub fn handle_batch(&self, records: &[QueueRecord]) -> BatchReport {
        self.deps.log.info(
            COMPONENT,
            "batch_received",
            json!({
                "records": records.len(),
                "source_role": self.source_role.map(Role::as_str),
            }),
        );

        let mut failed_ids = Vec::new();
        for record in records {
            match self.record_dead_letter(record) {
                Ok(key) => self.deps.log.warn(
                    COMPONENT,
                    "message_dead_lettered",
                    json!({
                        "message_id": record.message_id.clone(),
                        "receive_count": record.receive_count,
                        "trace_key": key,
                    }),
                ),
                Err(error) => {
                    self.deps.log.error(
                        COMPONENT,
                        "trace_write_failed",
                        json!({
                            "message_id": record.message_id.clone(),
                            "error": error.to_string(),
                        }),
                    );
                    failed_ids.push(record.message_id.clone());
                }
            }
        }

        self.deps.log.info(
            COMPONENT,
            "batch_completed",
            json!({ "records": records.len(), "failed": failed_ids.clone() }),
        );
        BatchReport::from_failed_ids(failed_ids)
    }

    fn record_dead_letter(&self, record: &QueueRecord) -> Result<String, StoreError> {
        let message = OrderMessage::decode(&record.body);
        let correlation_id = resolve_correlation_id(&message, self.deps.clock.now_millis());
        TraceRecorder::new(self.deps.store, self.deps.clock).record(
            &correlation_id,
            TraceStep::dead_letter(self.source_role),
            json!({
                "receiveCount": record.receive_count,
                "message": message.document(),
            }),
        )
    }
}
