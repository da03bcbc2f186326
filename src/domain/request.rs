//! Request model: mapping inbound `(host, path)` pairs onto tenant lookups.
//!
//! The tenant is the leftmost `Host` label; the logical path is the request
//! path relative to the deployed version's root, with `/` meaning the
//! default document.

/// Document served for the site root and as the SPA fallback entry point.
pub const DEFAULT_DOCUMENT: &str = "index.html";

/// Extract the tenant-identifying subdomain from a `Host` header value.
///
/// The subdomain is everything before the first `.`. Hosts without a
/// non-empty first label carry no tenant and yield `None`.
pub fn subdomain(host: &str) -> Option<&str> {
    let label = host.split('.').next().unwrap_or("");
    if label.is_empty() { None } else { Some(label) }
}

/// Map a request path onto the logical path inside a deployed version.
///
/// `/` becomes [`DEFAULT_DOCUMENT`]; any other path is taken verbatim with
/// the leading slash stripped.
pub fn logical_path(path: &str) -> String {
    if path == "/" {
        DEFAULT_DOCUMENT.to_string()
    } else {
        path.strip_prefix('/').unwrap_or(path).to_string()
    }
}

/// Whether a logical path is eligible for the SPA fallback.
///
/// Paths carrying a file extension name a concrete asset; only
/// extension-less paths fall back to the default document.
pub fn eligible_for_fallback(logical_path: &str) -> bool {
    !logical_path.contains('.')
}
