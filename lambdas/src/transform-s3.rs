use aws_lambda_events::event::s3::S3Event;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use shared::config::Config;
use shared::event::TriggerEvent;
use shared::response::{InvocationResponse, Outcome};
use shared::storage::{ObjectStore, S3Store};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        // disable printing the name of the module in every log line.
        .with_target(false)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        .init();

    let store = S3Store::new(shared::config::get_s3_client().await);
    let cfg = shared::config::get_service_cfg("transform-s3").await?;

    run(service_fn(|event| transform_s3(event, &store, &cfg))).await
}

/// Each record is handled on its own; one failing record does not stop the rest.
async fn transform_s3<S>(
    event: LambdaEvent<S3Event>,
    store: &S,
    cfg: &Config,
) -> Result<Vec<InvocationResponse>, Error>
where
    S: ObjectStore + ?Sized,
{
    let mut responses = vec![];

    for record in event.payload.records {
        let outcome = match TriggerEvent::from_record(&record) {
            Some(trigger) => shared::pipeline::handle(&trigger, store, cfg).await,
            None => {
                tracing::error!("Event record is missing bucket name or object key");
                Outcome::Failed {
                    reason: "event record is missing bucket name or object key".to_string(),
                }
            }
        };

        responses.push(InvocationResponse::from(outcome));
    }

    Ok(responses)
}
