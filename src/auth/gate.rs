//! Authorization gate in front of the forwarding handler

use crate::auth::validator::TokenValidator;
use crate::proxy::error_response::plain_text_error;
use crate::proxy::headers::{messages, AUTHORIZATION, BEARER_PREFIX};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// Outcome of checking a request's credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    MissingToken,
    InvalidToken,
    Forbidden,
}

impl GateDecision {
    /// Status and body for a rejected request, `None` when allowed
    pub fn rejection(self) -> Option<(StatusCode, &'static str)> {
        match self {
            Self::Allow => None,
            Self::MissingToken => Some((StatusCode::UNAUTHORIZED, messages::MISSING_TOKEN)),
            Self::InvalidToken => Some((StatusCode::UNAUTHORIZED, messages::INVALID_TOKEN)),
            Self::Forbidden => Some((StatusCode::FORBIDDEN, messages::FORBIDDEN)),
        }
    }
}

/// Decide whether the credentials in `headers` may pass
pub fn check_credentials(validator: &TokenValidator, headers: &HeaderMap) -> GateDecision {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return GateDecision::MissingToken;
    };
    if value.is_empty() {
        return GateDecision::MissingToken;
    }

    let Ok(raw) = value.to_str() else {
        debug!("Authorization header is not valid ASCII");
        return GateDecision::InvalidToken;
    };
    let token = raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw);

    let claims = match validator.validate(token) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "Rejected bearer token");
            return GateDecision::InvalidToken;
        }
    };

    match claims.role() {
        Ok(role) => {
            debug!(user_id = claims.id, %role, "Request authorized");
            GateDecision::Allow
        }
        Err(e) => {
            debug!(user_id = claims.id, error = %e, "Role not permitted");
            GateDecision::Forbidden
        }
    }
}

/// Middleware rejecting requests without an acceptable bearer token
///
/// Accepted requests reach the next service untouched.
pub async fn authorization_gate(
    State(validator): State<Arc<TokenValidator>>,
    request: Request,
    next: Next,
) -> Response {
    let decision = check_credentials(&validator, request.headers());
    match decision.rejection() {
        None => next.run(request).await,
        Some((status, message)) => plain_text_error(status, message),
    }
}
