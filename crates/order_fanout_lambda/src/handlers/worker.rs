//! Entry point shared by every queue-driven Lambda: one binary, role chosen by
//! configuration.

use aws_lambda_events::event::sqs::{SqsBatchResponse, SqsEvent};

use crate::adapters::sqs_records::{queue_records, sqs_batch_response};
use crate::config::WorkerKind;
use crate::handlers::consumer::{BatchConsumer, BatchError, ReportingMode};
use crate::handlers::dead_letter::DeadLetterRecorder;
use crate::handlers::stress::StressSimulator;
use crate::handlers::HandlerDeps;

pub enum FanoutWorker<'a> {
    Consumer(BatchConsumer<'a>),
    DeadLetter(DeadLetterRecorder<'a>),
}

impl<'a> FanoutWorker<'a> {
    /// `stress` is only attached to consumers; it is ignored for dead-letter
    /// recorders.
    pub fn from_kind(
        kind: WorkerKind,
        mode: ReportingMode,
        deps: HandlerDeps<'a>,
        stress: Option<&'a StressSimulator<'a>>,
    ) -> Self {
        match kind {
            WorkerKind::Consumer(role) => {
                let consumer = BatchConsumer::new(role, mode, deps);
                Self::Consumer(match stress {
                    Some(stress) => consumer.with_stress(stress),
                    None => consumer,
                })
            }
            WorkerKind::DeadLetter { source_role } => {
                Self::DeadLetter(DeadLetterRecorder::new(source_role, deps))
            }
        }
    }

    pub fn handle_sqs_event(&self, event: SqsEvent) -> Result<SqsBatchResponse, BatchError> {
        let records = queue_records(event);
        let report = match self {
            Self::Consumer(consumer) => consumer.handle_batch(&records)?,
            Self::DeadLetter(recorder) => recorder.handle_batch(&records),
        };
        Ok(sqs_batch_response(report))
    }
}
