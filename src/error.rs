use crate::diagnostics::DiagnosticsError;
use std::net::SocketAddr;
use thiserror::Error;

/// Bootstrap errors; every one of them stops the process
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Diagnostics error: {0}")]
    Diagnostics(#[from] DiagnosticsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Could not bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
