pub mod consumer;
pub mod dead_letter;
pub mod publisher;
pub mod stress;
pub mod worker;

use crate::adapters::clock::Clock;
use crate::adapters::log_sink::LogSink;
use crate::adapters::object_store::ObjectStore;

/// Process-lifetime collaborators shared by every handler invocation.
#[derive(Clone, Copy)]
pub struct HandlerDeps<'a> {
    pub store: &'a dyn ObjectStore,
    pub clock: &'a dyn Clock,
    pub log: &'a dyn LogSink,
}
