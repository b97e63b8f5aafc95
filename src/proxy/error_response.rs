//! Error responses written by the gateway itself
//!
//! Bodies are short plain-text messages terminated by a newline, the shape
//! clients of the gateway already parse.

use crate::proxy::headers::messages;
use crate::proxy::types::ProxyError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// Plain-text error response with `message` as the body
pub fn plain_text_error(status: StatusCode, message: &str) -> Response {
    let mut response = (status, format!("{message}\n")).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

/// Extension trait for consistent error formatting
pub trait ErrorResponseExt {
    /// Message shown to the caller
    fn public_message(&self) -> &'static str;

    /// Get the appropriate HTTP status code
    fn status_code(&self) -> StatusCode;
}

impl ErrorResponseExt for ProxyError {
    fn public_message(&self) -> &'static str {
        match self {
            ProxyError::RequestConstruction(_) => messages::REQUEST_CONSTRUCTION,
            ProxyError::Dispatch(_) | ProxyError::UpstreamTimeout(_) => messages::DISPATCH,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::RequestConstruction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Dispatch(_) | ProxyError::UpstreamTimeout(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        plain_text_error(self.status_code(), self.public_message())
    }
}
