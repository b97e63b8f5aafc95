//! Type definitions for the proxy module

use nutype::nutype;
use std::time::Duration;
use thiserror::Error;

/// How long an upstream may take to return response headers
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Path used when the inbound URI carries none
pub const DEFAULT_PATH: &str = "/";

/// Scheme, host and optional base path of the single upstream
///
/// Trailing slashes are trimmed so that joining an inbound path never
/// produces `//`.
#[nutype(
    sanitize(trim, with = |s: String| s.trim_end_matches('/').to_string()),
    validate(predicate = |s: &str| {
        let rest = s
            .strip_prefix("http://")
            .or_else(|| s.strip_prefix("https://"));
        matches!(rest, Some(host) if !host.is_empty())
    }),
    derive(Clone, Debug, Display, PartialEq, Eq, AsRef, TryFrom, Deserialize, Serialize),
)]
pub struct UpstreamOrigin(String);

impl UpstreamOrigin {
    /// Target URL for an inbound `path_and_query`
    pub fn join(&self, path_and_query: &str) -> String {
        let origin = self.as_ref();
        if path_and_query.is_empty() {
            format!("{origin}{DEFAULT_PATH}")
        } else if path_and_query.starts_with('/') {
            format!("{origin}{path_and_query}")
        } else {
            format!("{origin}/{path_and_query}")
        }
    }
}

/// Failures while relaying a request upstream
#[derive(Error, Debug)]
pub enum ProxyError {
    /// The outbound request could not be built
    #[error("{0}")]
    RequestConstruction(String),

    /// The upstream could not be reached or broke the exchange
    #[error("{0}")]
    Dispatch(String),

    #[error("upstream did not respond within {0:?}")]
    UpstreamTimeout(Duration),
}

pub type ProxyResult<T> = Result<T, ProxyError>;
