//! Auth Gateway - an authenticating reverse proxy
//!
//! Inbound requests must carry an HMAC-signed bearer token whose role is in
//! the allow-set; accepted requests are relayed unchanged to one upstream
//! origin. Infrastructure failures are recorded through an asynchronous
//! diagnostics subsystem that keeps file writes off the request path.

pub mod application;
pub mod auth;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod proxy;
pub mod tls;

pub use application::Application;
pub use config::Settings;
pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::{Error, Result};
