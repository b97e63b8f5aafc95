//! Gateway service: one wildcard route behind the middleware stack
//!
//! ```rust,ignore
//! let service = GatewayService::new(validator, forwarder);
//! let router = service.into_router();
//! axum::serve(listener, router).await?;
//! ```

use crate::auth::TokenValidator;
use crate::proxy::{forward::ForwardingHandler, middleware_stack::GatewayMiddlewareStack};
use axum::{
    extract::{Request, State},
    response::Response,
    Router,
};
use std::sync::Arc;
use tracing::debug;

/// Authorization gate and forwarding handler wired together
#[derive(Clone, Debug)]
pub struct GatewayService {
    validator: Arc<TokenValidator>,
    forwarder: Arc<ForwardingHandler>,
}

impl GatewayService {
    pub fn new(validator: Arc<TokenValidator>, forwarder: ForwardingHandler) -> Self {
        Self {
            validator,
            forwarder: Arc::new(forwarder),
        }
    }

    /// Router answering every method on every path
    pub fn into_router(self) -> Router {
        debug!(upstream = %self.forwarder.origin(), "Routing all paths upstream");
        let router = Router::new()
            .fallback(proxy_handler)
            .with_state(self.forwarder);

        GatewayMiddlewareStack::new(self.validator).apply_to_router(router)
    }
}

/// Axum handler for proxying requests
async fn proxy_handler(
    State(forwarder): State<Arc<ForwardingHandler>>,
    request: Request,
) -> Response {
    forwarder.forward(request).await
}
