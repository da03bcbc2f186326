//! Varco: delivery router for multi-tenant static sites.
//!
//! Every inbound request is resolved from its `Host` subdomain to an
//! immutable content version, and the matching file is served from object
//! storage through a two-tier cache:
//!
//! - **Resolution cache**: short-TTL map from subdomain to deployed version.
//! - **Content cache**: byte-budgeted LRU of fetched payloads with
//!   single-flight coalescing of concurrent misses.
//!
//! The control plane that writes pointer records lives elsewhere; this crate
//! only consumes them.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
