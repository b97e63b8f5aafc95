//! HTTP header constants and caller-facing messages

/// Authorization header prefix for bearer tokens
pub const BEARER_PREFIX: &str = "Bearer ";

/// Header name for request ID used for tracing and correlation
pub const X_REQUEST_ID: &str = "x-request-id";

pub use ::http::header::{AUTHORIZATION, HOST};

/// Bodies of responses the gateway writes itself
pub mod messages {
    pub const MISSING_TOKEN: &str = "Missing token";
    pub const INVALID_TOKEN: &str = "Invalid token";
    pub const FORBIDDEN: &str = "Forbidden";
    pub const REQUEST_CONSTRUCTION: &str = "Error creating request";
    pub const DISPATCH: &str = "Error forwarding request";
    /// Prefix of the diagnostic for a body that failed mid-stream
    pub const STREAMING: &str = "Error proxying response";
}

/// Copy every header except `Host` from `source` onto `target`, appending
///
/// Existing values on `target` are kept; multi-valued headers keep all
/// their values in order.
pub fn append_forwarded(source: &::http::HeaderMap, target: &mut ::http::HeaderMap) {
    for (name, value) in source {
        if name == HOST {
            continue;
        }
        target.append(name.clone(), value.clone());
    }
}

/// Copy every header from `source` onto `target`, appending
pub fn append_all(source: &::http::HeaderMap, target: &mut ::http::HeaderMap) {
    for (name, value) in source {
        target.append(name.clone(), value.clone());
    }
}
