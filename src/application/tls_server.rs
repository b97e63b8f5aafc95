//! HTTPS accept loop: rustls handshake, then HTTP/1 or HTTP/2 via hyper-util

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, warn};

/// Serve `router` over TLS until `shutdown` resolves
///
/// After shutdown no new connections are accepted; open connections finish
/// their in-flight requests before this returns.
pub async fn serve_tls<F>(listener: TcpListener, acceptor: TlsAcceptor, router: Router, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let builder = Builder::new(TokioExecutor::new());
    let (signal_tx, signal_rx) = watch::channel(());
    tokio::pin!(shutdown);

    loop {
        let (tcp, remote) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            },
            () = &mut shutdown => break,
        };

        let acceptor = acceptor.clone();
        let builder = builder.clone();
        let service = TowerToHyperService::new(router.clone());
        let mut signal_rx = signal_rx.clone();

        tokio::spawn(async move {
            let stream = match acceptor.accept(tcp).await {
                Ok(stream) => stream,
                Err(e) => {
                    debug!(%remote, error = %e, "TLS handshake failed");
                    return;
                }
            };

            let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
            tokio::pin!(conn);

            tokio::select! {
                result = conn.as_mut() => {
                    if let Err(e) = result {
                        debug!(%remote, error = %e, "Connection closed with error");
                    }
                }
                _ = signal_rx.changed() => {
                    conn.as_mut().graceful_shutdown();
                    if let Err(e) = conn.await {
                        debug!(%remote, error = %e, "Connection closed with error during shutdown");
                    }
                }
            }
            drop(signal_rx);
        });
    }

    drop(listener);
    drop(signal_rx);
    let _ = signal_tx.send(());
    signal_tx.closed().await;
}
