//! AWS Lambda entry point for the bookshop directory
//!
//! Deploy with `cargo lambda build --release --features lambda`.
//! Configuration comes from environment variables only.

use std::sync::Arc;

use bookshop_directory::lambda::{self, DirectoryRequest};
use lambda_runtime::{Error as LambdaError, LambdaEvent, service_fn};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the AWS Lambda function.
#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Bookshop directory Lambda starting...");
    let directory = lambda::init_directory().await?;
    info!("Serving from {} backend", directory.backend());

    lambda_runtime::run(service_fn(move |event: LambdaEvent<DirectoryRequest>| {
        lambda::handler(Arc::clone(&directory), event)
    }))
    .await
}
