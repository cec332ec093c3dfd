//! Shared fan-out pipeline domain primitives.
//!
//! This crate owns the message contract, the failure-injection policy, trace
//! step naming, storage keys and business artifact derivation. It intentionally
//! excludes AWS SDK and Lambda runtime concerns.

pub mod artifacts;
pub mod contract;
pub mod failure;
pub mod role;
pub mod routing;
pub mod storage_keys;
