//! Cold-start configuration read from the Lambda environment.
//!
//! Everything is resolved through a lookup function so tests can supply a map
//! instead of mutating the process environment.

use std::collections::HashMap;

use order_fanout_core::role::Role;

use crate::handlers::consumer::ReportingMode;
use crate::handlers::stress::StressSettings;

pub const DEFAULT_DATA_BUCKET: &str = "demo-data";
pub const DEAD_LETTER_WORKER: &str = "dlq";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be configured")]
    Missing(&'static str),
    #[error("{name}='{value}' is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsSettings {
    pub data_bucket: String,
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
}

impl AwsSettings {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            data_bucket: var(lookup, "DATA_BUCKET")
                .unwrap_or_else(|| DEFAULT_DATA_BUCKET.to_string()),
            endpoint_url: var(lookup, "AWS_ENDPOINT_URL"),
            region: var(lookup, "AWS_REGION").or_else(|| var(lookup, "region")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Consumer(Role),
    DeadLetter { source_role: Option<Role> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub aws: AwsSettings,
    pub kind: WorkerKind,
    pub reporting_mode: ReportingMode,
    pub stress: StressSettings,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let worker = var(&lookup, "WORKER_ROLE").ok_or(ConfigError::Missing("WORKER_ROLE"))?;
        let kind = if worker.eq_ignore_ascii_case(DEAD_LETTER_WORKER) {
            let source_role = var(&lookup, "DLQ_SOURCE_ROLE")
                .map(|value| parse_role("DLQ_SOURCE_ROLE", &value))
                .transpose()?;
            WorkerKind::DeadLetter { source_role }
        } else {
            WorkerKind::Consumer(parse_role("WORKER_ROLE", &worker)?)
        };

        let reporting_mode = match var(&lookup, "BATCH_FAILURE_MODE") {
            None => ReportingMode::default(),
            Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                name: "BATCH_FAILURE_MODE",
                value: value.clone(),
                reason,
            })?,
        };

        let fail_ratio = parse_number::<f64>(&lookup, "FAIL_RATIO")?.unwrap_or(0.0);
        if !fail_ratio.is_finite() {
            return Err(ConfigError::Invalid {
                name: "FAIL_RATIO",
                value: fail_ratio.to_string(),
                reason: "must be a finite number between 0 and 1".to_string(),
            });
        }
        let stress = StressSettings::new(
            fail_ratio,
            parse_number(&lookup, "SLEEP_MS")?.unwrap_or(0),
            parse_number(&lookup, "JITTER_MS")?.unwrap_or(0),
        );

        Ok(Self {
            aws: AwsSettings::from_lookup(&lookup),
            kind,
            reporting_mode,
            stress,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishTarget {
    Topic(String),
    Queue(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    pub aws: AwsSettings,
    /// `None` is reported to callers as a misconfiguration instead of failing
    /// cold start.
    pub target: Option<PublishTarget>,
}

impl PublisherConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let target = var(&lookup, "TOPIC_ARN")
            .or_else(|| var(&lookup, "topicArn"))
            .map(PublishTarget::Topic)
            .or_else(|| var(&lookup, "QUEUE_URL").map(PublishTarget::Queue));
        Self {
            aws: AwsSettings::from_lookup(&lookup),
            target,
        }
    }
}

/// Builds a lookup over a fixed map, mainly for tests and local tooling.
pub fn map_lookup(values: HashMap<String, String>) -> impl Fn(&str) -> Option<String> {
    move |name| values.get(name).cloned()
}

fn var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_role(name: &'static str, value: &str) -> Result<Role, ConfigError> {
    value.parse().map_err(|error| ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: format!("{error}"),
    })
}

fn parse_number<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    var(lookup, name)
        .map(|value| {
            value.parse::<T>().map_err(|error| ConfigError::Invalid {
                name,
                value: value.clone(),
                reason: error.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        map_lookup(
            pairs
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        )
    }

    #[test]
    fn worker_defaults_to_partial_reporting_and_demo_bucket() {
        let config = WorkerConfig::from_lookup(lookup(&[("WORKER_ROLE", "Shipping")]))
            .expect("config should load");

        assert_eq!(config.kind, WorkerKind::Consumer(Role::Shipping));
        assert_eq!(config.reporting_mode, ReportingMode::PartialFailure);
        assert_eq!(config.aws.data_bucket, DEFAULT_DATA_BUCKET);
        assert_eq!(config.aws.endpoint_url, None);
        assert_eq!(config.stress, StressSettings::new(0.0, 0, 0));
    }

    #[test]
    fn worker_reads_stress_and_endpoint_settings() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("WORKER_ROLE", "stress"),
            ("BATCH_FAILURE_MODE", "fail_fast"),
            ("FAIL_RATIO", "0.25"),
            ("SLEEP_MS", "200"),
            ("JITTER_MS", "50"),
            ("DATA_BUCKET", "orders-bucket"),
            ("AWS_ENDPOINT_URL", "http://localhost:4566"),
            ("region", "eu-west-1"),
        ]))
        .expect("config should load");

        assert_eq!(config.kind, WorkerKind::Consumer(Role::Stress));
        assert_eq!(config.reporting_mode, ReportingMode::FailFast);
        assert_eq!(config.stress, StressSettings::new(0.25, 200, 50));
        assert_eq!(config.aws.data_bucket, "orders-bucket");
        assert_eq!(
            config.aws.endpoint_url.as_deref(),
            Some("http://localhost:4566")
        );
        assert_eq!(config.aws.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn fail_ratio_is_clamped() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("WORKER_ROLE", "stress"),
            ("FAIL_RATIO", "3"),
        ]))
        .expect("config should load");
        assert_eq!(config.stress.fail_ratio(), 1.0);
    }

    #[test]
    fn dead_letter_worker_takes_optional_source_role() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("WORKER_ROLE", "dlq"),
            ("DLQ_SOURCE_ROLE", "fulfillment"),
        ]))
        .expect("config should load");
        assert_eq!(
            config.kind,
            WorkerKind::DeadLetter {
                source_role: Some(Role::Fulfillment)
            }
        );

        let config = WorkerConfig::from_lookup(lookup(&[("WORKER_ROLE", "DLQ")]))
            .expect("config should load");
        assert_eq!(config.kind, WorkerKind::DeadLetter { source_role: None });
    }

    #[test]
    fn rejects_missing_or_unknown_values() {
        assert_eq!(
            WorkerConfig::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("WORKER_ROLE"))
        );
        assert!(matches!(
            WorkerConfig::from_lookup(lookup(&[("WORKER_ROLE", "billing")])),
            Err(ConfigError::Invalid {
                name: "WORKER_ROLE",
                ..
            })
        ));
        assert!(matches!(
            WorkerConfig::from_lookup(lookup(&[
                ("WORKER_ROLE", "shipping"),
                ("SLEEP_MS", "soon")
            ])),
            Err(ConfigError::Invalid {
                name: "SLEEP_MS",
                ..
            })
        ));
        assert!(matches!(
            WorkerConfig::from_lookup(lookup(&[
                ("WORKER_ROLE", "shipping"),
                ("BATCH_FAILURE_MODE", "sometimes")
            ])),
            Err(ConfigError::Invalid {
                name: "BATCH_FAILURE_MODE",
                ..
            })
        ));
    }

    #[test]
    fn publisher_prefers_topic_over_queue() {
        let config = PublisherConfig::from_lookup(lookup(&[
            ("TOPIC_ARN", "arn:aws:sns:us-east-1:000000000000:orders"),
            ("QUEUE_URL", "http://localhost:4566/000000000000/throttle"),
        ]));
        assert_eq!(
            config.target,
            Some(PublishTarget::Topic(
                "arn:aws:sns:us-east-1:000000000000:orders".to_string()
            ))
        );

        let config = PublisherConfig::from_lookup(lookup(&[(
            "QUEUE_URL",
            "http://localhost:4566/000000000000/throttle",
        )]));
        assert!(matches!(config.target, Some(PublishTarget::Queue(_))));

        assert_eq!(PublisherConfig::from_lookup(lookup(&[])).target, None);
    }
}
