//! HTTP surface of the delivery router.
//!
//! Every path not claimed by a health probe is tenant content, so the
//! delivery handler is the router's fallback and serves all methods the way
//! the edge contract describes: 200 with the payload, or a plain-text 404.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode, header},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::compression::CompressionLayer;
use tracing::warn;

use crate::{
    application::delivery::DeliveryService,
    cache::SitePayload,
    infra::store::{ObjectStore, PointerStore, StoreError},
};

use super::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub delivery: Arc<DeliveryService>,
    pub pointer_store: Arc<dyn PointerStore>,
    pub object_store: Arc<dyn ObjectStore>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/_health/pointer", get(pointer_health))
        .route("/_health/object", get(object_health))
        .fallback(serve_site)
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn serve_site(State(state): State<HttpState>, request: Request<Body>) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok());

    match state.delivery.deliver(host, request.uri().path()).await {
        Ok(payload) => payload_response(payload),
        Err(err) => err.into_response(),
    }
}

fn payload_response(payload: SitePayload) -> Response {
    let content_type = HeaderValue::from_str(&payload.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    ([(header::CONTENT_TYPE, content_type)], payload.body).into_response()
}

async fn pointer_health(State(state): State<HttpState>) -> Response {
    store_health_response("pointer", state.pointer_store.ping().await)
}

async fn object_health(State(state): State<HttpState>) -> Response {
    store_health_response("object", state.object_store.ping().await)
}

fn store_health_response(store: &'static str, result: Result<(), StoreError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            warn!(
                target = "varco::http::health",
                store,
                error = %err,
                "store health probe failed"
            );
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
