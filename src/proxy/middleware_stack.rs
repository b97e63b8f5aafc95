//! Middleware stack builder for clean composition

use crate::auth::{authorization_gate, TokenValidator};
use crate::proxy::middleware::logging_middleware;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use std::sync::Arc;

/// Builder for the gateway's middleware stack
pub struct GatewayMiddlewareStack {
    validator: Arc<TokenValidator>,
}

impl GatewayMiddlewareStack {
    pub fn new(validator: Arc<TokenValidator>) -> Self {
        Self { validator }
    }

    /// Apply the complete middleware stack to a router
    ///
    /// Outer to inner:
    /// 1. Logging, so rejected requests are logged too
    /// 2. Authorization gate
    pub fn apply_to_router<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            .layer(from_fn_with_state(self.validator, authorization_gate))
            .layer(from_fn(logging_middleware))
    }
}
