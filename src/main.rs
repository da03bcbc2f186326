use std::{process, sync::Arc};

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use varco::{
    application::{delivery::DeliveryService, error::AppError},
    cache::{CacheConfig, ContentCache, ResolutionCache},
    config,
    infra::{
        error::InfraError,
        http::{HttpState, build_router},
        store::{ObjectStore, PointerStore, RedisPointerStore, S3ObjectStore},
        telemetry,
    },
    util::bytes::format_bytes,
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let cli_args = config::CliArgs::parse();
    let settings = config::load(&cli_args)?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let pointer_store: Arc<dyn PointerStore> =
        Arc::new(RedisPointerStore::connect(&settings.pointer_store.url).await?);
    let object_store: Arc<dyn ObjectStore> =
        Arc::new(S3ObjectStore::from_settings(&settings.object_store).await);

    let cache_config = CacheConfig::from(&settings.cache);
    let delivery = Arc::new(DeliveryService::new(
        ResolutionCache::new(pointer_store.clone(), cache_config.resolution_ttl),
        ContentCache::new(object_store.clone(), &cache_config),
    ));

    let router = build_router(HttpState {
        delivery,
        pointer_store,
        object_store,
    });

    let listener = TcpListener::bind(settings.server.listen)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "varco::server",
        listen = %settings.server.listen,
        bucket = %settings.object_store.bucket,
        resolution_ttl_ms = settings.cache.resolution_ttl.as_millis() as u64,
        content_ttl_secs = settings.cache.content_ttl.as_secs(),
        content_budget = %format_bytes(settings.cache.max_content_bytes),
        "Delivery router listening"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::server(err.to_string()))?;

    Ok(())
}
