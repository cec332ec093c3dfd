pub mod aws;
pub mod clock;
pub mod log_sink;
pub mod object_store;
pub mod pause;
pub mod publish;
pub mod sqs_records;
