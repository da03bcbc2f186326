//! Typed clients for the two external stores the router reads from.
//!
//! The pointer store maps subdomains to deployed content versions; the
//! object store holds the deployed files themselves. Both sit behind traits
//! so the caches and the delivery service stay independent of the concrete
//! backends, and so tests can inject in-memory fakes.

mod redis;
mod s3;

pub use redis::RedisPointerStore;
pub use s3::S3ObjectStore;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Failure from a store client. Always treated as transient by callers:
/// logged, counted, mapped to a not-found outcome for the affected call, and
/// never cached.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("pointer store error: {message}")]
    Pointer { message: String },
    #[error("object store error: {message}")]
    Object { message: String },
}

impl StoreError {
    pub fn pointer(message: impl Into<String>) -> Self {
        Self::Pointer {
            message: message.into(),
        }
    }

    pub fn object(message: impl Into<String>) -> Self {
        Self::Object {
            message: message.into(),
        }
    }
}

/// A file fetched from the object store, fully materialized.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    /// Content type reported by the store's metadata, when present.
    pub content_type: Option<String>,
}

/// Key/value lookup of `subdomain -> content version`.
///
/// Pointer records are written by the control plane on deployment; the
/// router only ever reads them.
#[async_trait]
pub trait PointerStore: Send + Sync {
    /// Look up the active content version for a subdomain.
    ///
    /// `Ok(None)` is a confirmed absence (no such tenant); `Err` is a
    /// transient store failure.
    async fn lookup(&self, subdomain: &str) -> Result<Option<String>, StoreError>;

    /// Connectivity probe for health reporting.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Blob lookup of `version/path -> file bytes`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a single object belonging to a deployed version.
    ///
    /// `Ok(None)` means no object exists at that key; `Err` is a transient
    /// store failure.
    async fn fetch(&self, version: &str, path: &str) -> Result<Option<StoredObject>, StoreError>;

    /// Connectivity probe for health reporting.
    async fn ping(&self) -> Result<(), StoreError>;
}
