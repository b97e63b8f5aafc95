//! End-to-end tests: real listener, real upstream (mockito), real tokens

use auth_gateway::{Application, Settings};
use axum::body::Body;
use config::Config;
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use mockito::{Matcher, Server};
use proptest::prelude::*;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const SECRET: &str = "e2e-signing-secret";

struct Gateway {
    addr: SocketAddr,
    log_dir: TempDir,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<auth_gateway::Result<()>>,
}

impl Gateway {
    async fn start(upstream: &str) -> Self {
        let log_dir = tempfile::tempdir().unwrap();
        let config = Settings::with_defaults(Config::builder())
            .unwrap()
            .set_override("jwt_sign_key", SECRET)
            .unwrap()
            .set_override("target_domain", upstream)
            .unwrap()
            .set_override("log_dir", log_dir.path().to_string_lossy().to_string())
            .unwrap()
            .build()
            .unwrap();
        let app = Application::new(Settings::from_config(config).unwrap()).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, stop) = oneshot::channel::<()>();
        let server = tokio::spawn(app.serve(listener, async move {
            let _ = stop.await;
        }));

        Self {
            addr,
            log_dir,
            shutdown,
            server,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Stop the server; returns the directory holding the sinks
    async fn stop(self) -> TempDir {
        let _ = self.shutdown.send(());
        self.server.await.unwrap().unwrap();
        self.log_dir
    }
}

fn client() -> Client<HttpConnector, Body> {
    Client::builder(TokioExecutor::new()).build_http()
}

fn token(role: &str, algorithm: Algorithm, secret: &str) -> String {
    let claims = serde_json::json!({
        "id": 42,
        "first_name": "Grace",
        "role": role,
        "type": "access",
        "exp": chrono::Utc::now().timestamp() + 600,
    });
    jsonwebtoken::encode(
        &Header::new(algorithm),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn read_sink(dir: &Path, file: &str) -> String {
    let path: PathBuf = dir.join(file);
    std::fs::read_to_string(path).unwrap_or_default()
}

async fn body_string(response: hyper::Response<hyper::body::Incoming>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn admin_request_is_relayed_byte_identical() {
    let mut upstream = Server::new_async().await;
    let mock = upstream
        .mock("GET", "/orders/42")
        .match_query(Matcher::UrlEncoded("x".into(), "1".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("x-upstream", "orders")
        .with_body(r#"{"id":42}"#)
        .expect(1)
        .create_async()
        .await;
    let gateway = Gateway::start(&upstream.url()).await;

    let request = Request::builder()
        .uri(gateway.url("/orders/42?x=1"))
        .header(
            "authorization",
            format!("Bearer {}", token("ADMIN", Algorithm::HS256, SECRET)),
        )
        .body(Body::empty())
        .unwrap();
    let response = client().request(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(response.headers()["x-upstream"], "orders");
    assert_eq!(body_string(response).await, r#"{"id":42}"#);
    mock.assert_async().await;

    let logs = gateway.stop().await;
    assert!(read_sink(logs.path(), "errors.log").is_empty());
    assert!(read_sink(logs.path(), "info.log").contains("Proxy server running on port"));
}

#[tokio::test]
async fn method_headers_and_body_reach_the_upstream() {
    let mut upstream = Server::new_async().await;
    let bearer = format!("Bearer {}", token("COURIER", Algorithm::HS384, SECRET));
    let mock = upstream
        .mock("PUT", "/deliveries/7")
        .match_header("authorization", bearer.as_str())
        .match_header("x-client", "mobile")
        .match_header("content-type", "application/json")
        .match_body(r#"{"state":"delivered"}"#)
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let gateway = Gateway::start(&upstream.url()).await;

    let request = Request::builder()
        .method("PUT")
        .uri(gateway.url("/deliveries/7"))
        .header("authorization", bearer.as_str())
        .header("x-client", "mobile")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"state":"delivered"}"#))
        .unwrap();
    let response = client().request(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    mock.assert_async().await;
    gateway.stop().await;
}

#[tokio::test]
async fn upstream_status_is_passed_through() {
    let mut upstream = Server::new_async().await;
    let _mock = upstream
        .mock("GET", "/missing")
        .with_status(404)
        .with_body("no such order")
        .create_async()
        .await;
    let gateway = Gateway::start(&upstream.url()).await;

    let request = Request::builder()
        .uri(gateway.url("/missing"))
        .header(
            "authorization",
            format!("Bearer {}", token("VENDOR", Algorithm::HS512, SECRET)),
        )
        .body(Body::empty())
        .unwrap();
    let response = client().request(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "no such order");

    let logs = gateway.stop().await;
    assert!(read_sink(logs.path(), "errors.log").is_empty());
}

#[tokio::test]
async fn missing_token_is_rejected_without_contacting_upstream() {
    let mut upstream = Server::new_async().await;
    let mock = upstream
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let gateway = Gateway::start(&upstream.url()).await;

    let request = Request::builder()
        .uri(gateway.url("/orders"))
        .body(Body::empty())
        .unwrap();
    let response = client().request(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_string(response).await, "Missing token\n");
    mock.assert_async().await;

    let logs = gateway.stop().await;
    assert!(read_sink(logs.path(), "errors.log").is_empty());
}

#[tokio::test]
async fn foreign_signature_is_unauthorized_and_unknown_role_forbidden() {
    let mut upstream = Server::new_async().await;
    let mock = upstream
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let gateway = Gateway::start(&upstream.url()).await;
    let client = client();

    let foreign = Request::builder()
        .uri(gateway.url("/orders"))
        .header(
            "authorization",
            format!("Bearer {}", token("ADMIN", Algorithm::HS256, "another-secret")),
        )
        .body(Body::empty())
        .unwrap();
    let response = client.request(foreign).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_string(response).await, "Invalid token\n");

    let guest = Request::builder()
        .uri(gateway.url("/orders"))
        .header(
            "authorization",
            format!("Bearer {}", token("GUEST", Algorithm::HS256, SECRET)),
        )
        .body(Body::empty())
        .unwrap();
    let response = client.request(guest).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(response).await, "Forbidden\n");

    mock.assert_async().await;
    let logs = gateway.stop().await;
    assert!(read_sink(logs.path(), "errors.log").is_empty());
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway_with_error_diagnostic() {
    // Bind then drop to get a port nothing listens on
    let dead = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let gateway = Gateway::start(&format!("http://{dead}")).await;

    let request = Request::builder()
        .uri(gateway.url("/orders"))
        .header(
            "authorization",
            format!("Bearer {}", token("USER", Algorithm::HS256, SECRET)),
        )
        .body(Body::empty())
        .unwrap();
    let response = client().request(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_string(response).await, "Error forwarding request\n");

    let logs = gateway.stop().await;
    let errors = read_sink(logs.path(), "errors.log");
    assert_eq!(errors.lines().count(), 1);
    assert!(errors.contains("level=ERROR"));
    assert!(errors.contains("Error forwarding request: "));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn requests_without_authorization_are_always_unauthorized(
        method in prop::sample::select(vec!["GET", "POST", "PUT", "PATCH", "DELETE"]),
        path in "/[a-z0-9]{0,12}(/[a-z0-9]{1,8}){0,3}",
    ) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();

        let status = runtime.block_on(async {
            let mut upstream = Server::new_async().await;
            let mock = upstream
                .mock(method, Matcher::Any)
                .expect(0)
                .create_async()
                .await;
            let gateway = Gateway::start(&upstream.url()).await;

            let request = Request::builder()
                .method(method)
                .uri(gateway.url(&path))
                .body(Body::empty())
                .unwrap();
            let status = client().request(request).await.unwrap().status();

            mock.assert_async().await;
            gateway.stop().await;
            status
        });

        prop_assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
