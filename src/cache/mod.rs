//! Varco cache system.
//!
//! Two read-through tiers sit between the request path and the stores:
//!
//! - **Resolution cache**: short-TTL map from subdomain to deployed content
//!   version. Positive and negative outcomes are cached identically.
//! - **Content cache**: byte-budgeted, TTL-bounded LRU of fetched payloads,
//!   with single-flight coalescing of concurrent misses.
//!
//! Both tiers are internally synchronized and shared by reference across all
//! request handlers; neither requires caller-side locking. Store failures
//! never escape a tier: they are logged, counted, and mapped to a not-found
//! outcome for the affected call, and never cached.

mod config;
mod content;
mod lock;
mod resolution;

pub use config::CacheConfig;
pub use content::{ContentCache, SitePayload};
pub use resolution::ResolutionCache;
