//! AWS SDK implementations of the storage and publishing adapters.
//!
//! Handlers are synchronous; each call bridges onto the Lambda runtime with
//! `block_in_place`, so the binaries must run on the multi-threaded runtime.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;

use aws_sdk_s3::primitives::ByteStream;

use crate::adapters::object_store::{ObjectStore, StoreError};
use crate::adapters::publish::{EventPublisher, PublishError};

const STRING_DATA_TYPE: &str = "String";
const JSON_CONTENT_TYPE: &str = "application/json";

pub async fn load_sdk_config(
    endpoint_url: Option<&str>,
    region: Option<&str>,
) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(endpoint_url) = endpoint_url {
        loader = loader.endpoint_url(endpoint_url);
    }
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region.to_string()));
    }
    loader.load().await
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

pub struct S3ObjectStore {
    bucket: String,
    s3_client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    /// Path-style addressing is forced when an endpoint override is present,
    /// which local emulators require.
    pub fn new(bucket: impl Into<String>, sdk_config: &aws_config::SdkConfig) -> Self {
        let force_path_style = sdk_config.endpoint_url().is_some();
        let s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
            .force_path_style(force_path_style)
            .build();
        Self {
            bucket: bucket.into(),
            s3_client: aws_sdk_s3::Client::from_conf(s3_config),
        }
    }
}

impl ObjectStore for S3ObjectStore {
    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), StoreError> {
        let request = self
            .s3_client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(JSON_CONTENT_TYPE)
            .body(ByteStream::from(body.to_vec()));

        block_on(async move { request.send().await })
            .map(|_| ())
            .map_err(|error| StoreError::Write {
                key: key.to_string(),
                message: format!("{error}"),
            })
    }

    fn read_object(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let request = self.s3_client.get_object().bucket(&self.bucket).key(key);
        let read_error = |message: String| StoreError::Read {
            key: key.to_string(),
            message,
        };

        block_on(async move {
            let output = match request.send().await {
                Ok(output) => output,
                Err(error) => {
                    let missing = error
                        .as_service_error()
                        .map(|service_error| service_error.is_no_such_key())
                        .unwrap_or(false);
                    if missing {
                        return Ok(None);
                    }
                    return Err(read_error(format!("{error}")));
                }
            };
            let bytes = output
                .body
                .collect()
                .await
                .map_err(|error| read_error(error.to_string()))?;
            Ok(Some(bytes.into_bytes().to_vec()))
        })
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let client = self.s3_client.clone();
        let bucket = self.bucket.clone();
        let list_error = |message: String| StoreError::List {
            prefix: prefix.to_string(),
            message,
        };

        block_on(async move {
            let mut keys = Vec::new();
            let mut continuation_token: Option<String> = None;
            loop {
                let output = client
                    .list_objects_v2()
                    .bucket(&bucket)
                    .prefix(prefix)
                    .set_continuation_token(continuation_token.take())
                    .send()
                    .await
                    .map_err(|error| list_error(format!("{error}")))?;

                keys.extend(
                    output
                        .contents()
                        .iter()
                        .filter_map(|object| object.key().map(str::to_string)),
                );

                match output.next_continuation_token() {
                    Some(token) if output.is_truncated().unwrap_or(false) => {
                        continuation_token = Some(token.to_string());
                    }
                    _ => break,
                }
            }
            Ok(keys)
        })
    }
}

pub struct SnsEventPublisher {
    topic_arn: String,
    sns_client: aws_sdk_sns::Client,
}

impl SnsEventPublisher {
    pub fn new(topic_arn: impl Into<String>, sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            topic_arn: topic_arn.into(),
            sns_client: aws_sdk_sns::Client::new(sdk_config),
        }
    }
}

impl EventPublisher for SnsEventPublisher {
    fn publish(
        &self,
        body: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<String, PublishError> {
        let mut message_attributes = HashMap::with_capacity(attributes.len());
        for (name, value) in attributes {
            let attribute = aws_sdk_sns::types::MessageAttributeValue::builder()
                .data_type(STRING_DATA_TYPE)
                .string_value(value)
                .build()
                .map_err(|error| PublishError::Attribute {
                    name: name.clone(),
                    message: error.to_string(),
                })?;
            message_attributes.insert(name.clone(), attribute);
        }

        let request = self
            .sns_client
            .publish()
            .topic_arn(&self.topic_arn)
            .message(body)
            .set_message_attributes(Some(message_attributes));

        block_on(async move { request.send().await })
            .map(|output| output.message_id().unwrap_or_default().to_string())
            .map_err(|error| PublishError::Send {
                target: self.topic_arn.clone(),
                message: format!("{error}"),
            })
    }

    fn target(&self) -> &str {
        &self.topic_arn
    }
}

/// Sends events straight to a queue, bypassing the topic. Used to load the
/// throttling queue of the stress worker.
pub struct SqsEventPublisher {
    queue_url: String,
    sqs_client: aws_sdk_sqs::Client,
}

impl SqsEventPublisher {
    pub fn new(queue_url: impl Into<String>, sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            queue_url: queue_url.into(),
            sqs_client: aws_sdk_sqs::Client::new(sdk_config),
        }
    }
}

impl EventPublisher for SqsEventPublisher {
    fn publish(
        &self,
        body: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<String, PublishError> {
        let mut message_attributes = HashMap::with_capacity(attributes.len());
        for (name, value) in attributes {
            let attribute = aws_sdk_sqs::types::MessageAttributeValue::builder()
                .data_type(STRING_DATA_TYPE)
                .string_value(value)
                .build()
                .map_err(|error| PublishError::Attribute {
                    name: name.clone(),
                    message: error.to_string(),
                })?;
            message_attributes.insert(name.clone(), attribute);
        }

        let request = self
            .sqs_client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .set_message_attributes(Some(message_attributes));

        block_on(async move { request.send().await })
            .map(|output| output.message_id().unwrap_or_default().to_string())
            .map_err(|error| PublishError::Send {
                target: self.queue_url.clone(),
                message: format!("{error}"),
            })
    }

    fn target(&self) -> &str {
        &self.queue_url
    }
}
