//! Application lifecycle: start diagnostics, wire the gateway, serve until shutdown

use crate::application::signal::shutdown_signal;
use crate::application::tls_server::serve_tls;
use crate::auth::TokenValidator;
use crate::config::{ListenerSettings, Settings};
use crate::diagnostics::Diagnostics;
use crate::error::Error;
use crate::proxy::{ForwardingHandler, GatewayService};
use crate::Result;
use axum::Router;
use rustls::ServerConfig;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{info, instrument};

/// Main application struct that coordinates all components
pub struct Application {
    settings: Settings,
    diagnostics: Diagnostics,
    router: Router,
    tls: Option<Arc<ServerConfig>>,
}

impl Application {
    /// Start diagnostics and wire the gateway
    ///
    /// Must be called inside a Tokio runtime. Fails if a log sink cannot be
    /// opened or, in production, if the certificate or key cannot be loaded.
    #[instrument(skip_all)]
    pub fn new(settings: Settings) -> Result<Self> {
        let diagnostics = Diagnostics::start_new(settings.diagnostics.clone())?;
        info!(
            log_dir = %settings.diagnostics.log_dir.display(),
            "Diagnostics consumer running"
        );

        let tls = match &settings.listener {
            ListenerSettings::Plain { .. } => None,
            ListenerSettings::Tls {
                cert_path,
                key_path,
                ..
            } => Some(crate::tls::load_server_config(cert_path, key_path)?),
        };

        let validator = Arc::new(TokenValidator::new(settings.token.signing_secret()));
        let forwarder = ForwardingHandler::new(
            settings.upstream.origin.clone(),
            settings.upstream.timeout,
            diagnostics.clone(),
        );
        let router = GatewayService::new(validator, forwarder).into_router();

        info!(upstream = %settings.upstream.origin, "Gateway configured");

        Ok(Self {
            settings,
            diagnostics,
            router,
            tls,
        })
    }

    /// Serve until Ctrl-C or SIGTERM
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.settings.listener.addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves
    ///
    /// Diagnostics submitted while serving are flushed before returning.
    #[instrument(skip_all)]
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        let Self {
            diagnostics,
            router,
            tls,
            ..
        } = self;

        let result = match tls {
            Some(config) => {
                announce(&diagnostics, local_addr.port(), true).await;
                serve_tls(listener, TlsAcceptor::from(config), router, shutdown).await;
                Ok(())
            }
            None => {
                announce(&diagnostics, local_addr.port(), false).await;
                axum::serve(listener, router)
                    .with_graceful_shutdown(shutdown)
                    .await
                    .map_err(Error::Io)
            }
        };

        info!("Server stopped, flushing diagnostics");
        diagnostics.flush().await;
        result
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

async fn announce(diagnostics: &Diagnostics, port: u16, tls: bool) {
    let message = if tls {
        format!("Proxy server running on port {port} with SSL")
    } else {
        format!("Proxy server running on port {port}")
    };
    diagnostics.info(message).await;
}
