use lambda_runtime::{service_fn, Error, LambdaEvent};
use order_fanout_lambda::adapters::aws::{
    load_sdk_config, S3ObjectStore, SnsEventPublisher, SqsEventPublisher,
};
use order_fanout_lambda::adapters::clock::SystemClock;
use order_fanout_lambda::adapters::log_sink::{init_tracing, TracingLogSink};
use order_fanout_lambda::adapters::publish::EventPublisher;
use order_fanout_lambda::config::{PublishTarget, PublisherConfig};
use order_fanout_lambda::handlers::publisher::{handle_publish_event, ApiGatewayResponse};
use order_fanout_lambda::handlers::HandlerDeps;
use serde_json::Value;

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = PublisherConfig::from_env();
    let sdk_config = load_sdk_config(
        config.aws.endpoint_url.as_deref(),
        config.aws.region.as_deref(),
    )
    .await;

    let publisher: Option<Box<dyn EventPublisher>> = match &config.target {
        Some(PublishTarget::Topic(topic_arn)) => {
            Some(Box::new(SnsEventPublisher::new(topic_arn.clone(), &sdk_config)))
        }
        Some(PublishTarget::Queue(queue_url)) => {
            Some(Box::new(SqsEventPublisher::new(queue_url.clone(), &sdk_config)))
        }
        None => {
            tracing::warn!("neither TOPIC_ARN nor QUEUE_URL is configured");
            None
        }
    };
    let store = S3ObjectStore::new(config.aws.data_bucket.clone(), &sdk_config);
    let clock = SystemClock;
    let log = TracingLogSink;

    let deps = HandlerDeps {
        store: &store,
        clock: &clock,
        log: &log,
    };
    let publisher = publisher.as_deref();

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        Ok::<ApiGatewayResponse, Error>(handle_publish_event(
            event.payload,
            publisher,
            deps,
            || uuid::Uuid::new_v4().to_string(),
        ))
    }))
    .await
}
