//! Delivery service: the per-request decision sequence.
//!
//! Host parsing, pointer resolution, cache-assisted fetch, and SPA fallback
//! run as one linear pass per request. The service holds the caches, the
//! only shared mutable state in the process, and is itself shared by
//! reference across all handlers.

use tracing::debug;

use crate::cache::{ContentCache, ResolutionCache, SitePayload};
use crate::domain::request;

use super::error::DeliveryError;

pub struct DeliveryService {
    resolution: ResolutionCache,
    content: ContentCache,
}

impl DeliveryService {
    pub fn new(resolution: ResolutionCache, content: ContentCache) -> Self {
        Self {
            resolution,
            content,
        }
    }

    /// Serve one request: `(host, path)` in, payload or a 404 reason out.
    ///
    /// Extension-less paths that miss fall back to the version's
    /// [`request::DEFAULT_DOCUMENT`], so client-side routed apps deep-link
    /// correctly.
    pub async fn deliver(
        &self,
        host: Option<&str>,
        path: &str,
    ) -> Result<SitePayload, DeliveryError> {
        let subdomain = host
            .and_then(request::subdomain)
            .ok_or(DeliveryError::InvalidHost)?;

        let version = self
            .resolution
            .resolve(subdomain)
            .await
            .ok_or(DeliveryError::UnresolvedTenant)?;

        let logical_path = request::logical_path(path);
        debug!(
            target = "varco::delivery",
            subdomain,
            version = %version,
            path = %logical_path,
            "serving request"
        );

        if let Some(payload) = self.content.get(&version, &logical_path).await {
            return Ok(payload);
        }

        if request::eligible_for_fallback(&logical_path) {
            if let Some(payload) = self.content.get(&version, request::DEFAULT_DOCUMENT).await {
                return Ok(payload);
            }
        }

        Err(DeliveryError::ContentNotFound)
    }
}
