use aws_lambda_events::event::sqs::SqsEvent;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use order_fanout_core::role::Role;
use order_fanout_lambda::adapters::aws::{load_sdk_config, S3ObjectStore};
use order_fanout_lambda::adapters::clock::SystemClock;
use order_fanout_lambda::adapters::log_sink::{init_tracing, TracingLogSink};
use order_fanout_lambda::adapters::pause::TokioPause;
use order_fanout_lambda::config::{WorkerConfig, WorkerKind};
use order_fanout_lambda::handlers::stress::{StressSimulator, ThreadRandomness};
use order_fanout_lambda::handlers::worker::FanoutWorker;
use order_fanout_lambda::handlers::HandlerDeps;

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = WorkerConfig::from_env()?;
    tracing::info!(
        kind = ?config.kind,
        mode = config.reporting_mode.as_str(),
        bucket = %config.aws.data_bucket,
        "worker configured"
    );

    let sdk_config = load_sdk_config(
        config.aws.endpoint_url.as_deref(),
        config.aws.region.as_deref(),
    )
    .await;
    let store = S3ObjectStore::new(config.aws.data_bucket.clone(), &sdk_config);
    let clock = SystemClock;
    let log = TracingLogSink;
    let randomness = ThreadRandomness;
    let pause = TokioPause;
    let stress = StressSimulator::new(config.stress, &randomness, &pause);

    let deps = HandlerDeps {
        store: &store,
        clock: &clock,
        log: &log,
    };
    let worker = FanoutWorker::from_kind(
        config.kind,
        config.reporting_mode,
        deps,
        is_stress_worker(&config).then_some(&stress),
    );
    let worker = &worker;

    lambda_runtime::run(service_fn(move |event: LambdaEvent<SqsEvent>| async move {
        worker.handle_sqs_event(event.payload).map_err(Error::from)
    }))
    .await
}

fn is_stress_worker(config: &WorkerConfig) -> bool {
    matches!(config.kind, WorkerKind::Consumer(Role::Stress))
}

