//! Forwarding handler: relays an authorized request to the upstream origin

use crate::diagnostics::Diagnostics;
use crate::proxy::body::ObservedBody;
use crate::proxy::error_response::ErrorResponseExt;
use crate::proxy::headers::{append_all, append_forwarded, messages};
use crate::proxy::types::{ProxyError, ProxyResult, UpstreamOrigin, DEFAULT_PATH};
use axum::{
    body::Body,
    extract::Request,
    http::{request::Parts, Method, StatusCode},
    response::{IntoResponse, Response},
};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use std::error::Error as StdError;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;
type UpstreamResponse = hyper::Response<hyper::body::Incoming>;

/// Relays requests to a single upstream origin
#[derive(Clone)]
pub struct ForwardingHandler {
    client: UpstreamClient,
    origin: UpstreamOrigin,
    timeout: Duration,
    diagnostics: Diagnostics,
}

impl std::fmt::Debug for ForwardingHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardingHandler")
            .field("origin", &self.origin)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ForwardingHandler {
    /// Build a handler with its own upstream client
    ///
    /// The client speaks plain HTTP or HTTPS depending on the origin scheme and
    /// trusts the platform's native roots.
    pub fn new(origin: UpstreamOrigin, timeout: Duration, diagnostics: Diagnostics) -> Self {
        crate::tls::install_crypto_provider();

        let builder = match HttpsConnectorBuilder::new().with_native_roots() {
            Ok(builder) => builder,
            Err(e) => {
                warn!(error = %e, "Could not load native TLS roots; https upstreams will fail verification");
                let config = rustls::ClientConfig::builder()
                    .with_root_certificates(rustls::RootCertStore::empty())
                    .with_no_client_auth();
                HttpsConnectorBuilder::new().with_tls_config(config)
            }
        };
        let connector = builder
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            origin,
            timeout,
            diagnostics,
        }
    }

    pub fn origin(&self) -> &UpstreamOrigin {
        &self.origin
    }

    /// Relay `request` upstream and stream the answer back
    ///
    /// Failures before the upstream answers become 500 or 502 responses and
    /// an Error diagnostic. The upstream call runs on its own task, so a
    /// caller hanging up does not cancel it; it still ends on completion or
    /// timeout, and still reports its failure.
    pub async fn forward(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let bodyless = parts.method == Method::HEAD;

        let outbound = match self.build_outbound(&parts, body) {
            Ok(outbound) => outbound,
            Err(e) => {
                report(&self.diagnostics, messages::REQUEST_CONSTRUCTION, &e).await;
                return gateway_error(e);
            }
        };

        debug!(method = %parts.method, target = %outbound.uri(), "Forwarding request");

        let upstream = match self.spawn_dispatch(outbound).await {
            Ok(Ok(upstream)) => upstream,
            Ok(Err(e)) => return gateway_error(e),
            Err(e) => {
                let error = ProxyError::Dispatch(e.to_string());
                report(&self.diagnostics, messages::DISPATCH, &error).await;
                return gateway_error(error);
            }
        };

        self.relay(upstream, bodyless)
    }

    fn build_outbound(&self, parts: &Parts, body: Body) -> ProxyResult<Request> {
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or(DEFAULT_PATH);
        let target = self.origin.join(path_and_query);

        let mut builder = Request::builder().method(parts.method.clone()).uri(target);
        if let Some(headers) = builder.headers_mut() {
            append_forwarded(&parts.headers, headers);
        }

        builder
            .body(body)
            .map_err(|e| ProxyError::RequestConstruction(e.to_string()))
    }

    /// Send `outbound` on a detached task owning the timeout
    fn spawn_dispatch(&self, outbound: Request) -> JoinHandle<ProxyResult<UpstreamResponse>> {
        let client = self.client.clone();
        let timeout = self.timeout;
        let diagnostics = self.diagnostics.clone();

        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, client.request(outbound)).await {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => Err(ProxyError::Dispatch(error_chain(&e))),
                Err(_) => Err(ProxyError::UpstreamTimeout(timeout)),
            };
            if let Err(e) = &result {
                report(&diagnostics, messages::DISPATCH, e).await;
            }
            result
        })
    }

    fn relay(&self, upstream: UpstreamResponse, bodyless: bool) -> Response {
        let (parts, body) = upstream.into_parts();

        let body = if bodyless
            || parts.status == StatusCode::NO_CONTENT
            || parts.status == StatusCode::NOT_MODIFIED
        {
            Body::empty()
        } else {
            Body::new(ObservedBody::new(body, self.diagnostics.clone()))
        };

        let mut response = Response::new(body);
        *response.status_mut() = parts.status;
        append_all(&parts.headers, response.headers_mut());
        response
    }
}

async fn report(diagnostics: &Diagnostics, context: &str, error: &ProxyError) {
    warn!(error = %error, "{context}");
    diagnostics.error_f(format!("{context}: {error}")).await;
}

fn gateway_error(error: ProxyError) -> Response {
    debug!(status = error.status_code().as_u16(), "Answering with gateway error");
    error.into_response()
}

/// Render an error with its chain of sources
fn error_chain(error: &dyn StdError) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
