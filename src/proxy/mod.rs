//! Reverse-proxy half of the gateway
//!
//! Every inbound request passes the logging middleware and the authorization
//! gate; accepted requests are relayed to the single upstream origin and the
//! upstream's answer is streamed back unchanged.

pub mod body;
pub mod error_response;
pub mod forward;
pub mod headers;
pub mod middleware;
pub mod middleware_stack;
pub mod service;
pub mod types;

pub use forward::ForwardingHandler;
pub use service::GatewayService;
pub use types::{ProxyError, ProxyResult, UpstreamOrigin, DEFAULT_UPSTREAM_TIMEOUT};
