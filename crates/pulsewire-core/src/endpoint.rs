//! Endpoint derivation.
//!
//! The push endpoint lives on the same origin as the application. Its scheme
//! mirrors the origin's transport security: `https` pages talk `wss`, plain
//! `http` pages talk `ws`.

use url::Url;

use crate::error::ChannelError;

/// Derive the WebSocket URL for `path` on `origin`.
///
/// `origin` may be a bare origin or any page URL on it; the page path, query
/// and fragment are replaced.
///
/// # Errors
///
/// - `ChannelError::InvalidEndpoint` if `origin` does not parse, has no host,
///   or uses a scheme other than `http`, `https`, `ws` or `wss`
pub fn derive(origin: &str, path: &str) -> Result<Url, ChannelError> {
    let invalid = |reason: &str| ChannelError::InvalidEndpoint {
        origin: origin.to_string(),
        reason: reason.to_string(),
    };

    let mut url = Url::parse(origin).map_err(|e| invalid(&e.to_string()))?;
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(invalid(&format!("unsupported scheme {other:?}"))),
    };
    url.set_scheme(scheme).map_err(|()| invalid("scheme cannot be changed"))?;

    url.set_path(path);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}
