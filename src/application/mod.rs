//! Process bootstrap: settings in, listening gateway out

pub mod app;
pub mod signal;
pub mod tls_server;

pub use app::Application;
