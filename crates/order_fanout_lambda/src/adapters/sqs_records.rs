use aws_lambda_events::event::sqs::{BatchItemFailure, SqsBatchResponse, SqsEvent, SqsMessage};
use order_fanout_core::contract::{BatchReport, QueueRecord, DEFAULT_RECEIVE_COUNT};

const RECEIVE_COUNT_ATTRIBUTE: &str = "ApproximateReceiveCount";
const EMPTY_BODY: &str = "{}";

pub fn queue_records(event: SqsEvent) -> Vec<QueueRecord> {
    event.records.into_iter().map(queue_record).collect()
}

fn queue_record(message: SqsMessage) -> QueueRecord {
    let receive_count = message
        .attributes
        .get(RECEIVE_COUNT_ATTRIBUTE)
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(DEFAULT_RECEIVE_COUNT);

    QueueRecord {
        message_id: message.message_id.unwrap_or_default(),
        body: message
            .body
            .filter(|body| !body.is_empty())
            .unwrap_or_else(|| EMPTY_BODY.to_string()),
        receive_count,
    }
}

/// Partial-batch response returned to the queue trigger. An empty failure list
/// tells the event source mapping that the whole batch was consumed.
pub fn sqs_batch_response(report: BatchReport) -> SqsBatchResponse {
    SqsBatchResponse {
        batch_item_failures: report
            .into_failed_ids()
            .into_iter()
            .map(|item_identifier| BatchItemFailure { item_identifier })
            .collect(),
    }
}
