//! Outbound destination checks.

use url::Url;

pub mod allowlist;

pub use allowlist::EndpointAllowlist;

/// Scheme and authority of `url`, path and query dropped. `None` without a host.
pub fn endpoint(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}
