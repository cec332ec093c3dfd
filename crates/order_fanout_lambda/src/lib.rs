//! Lambda adapters and handlers for the order fan-out trace pipeline.
//!
//! Handlers are synchronous and depend only on the adapter traits in
//! [`adapters`]; the binaries wire in the AWS SDK implementations. Domain
//! rules live in `order_fanout_core`.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod trace;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
