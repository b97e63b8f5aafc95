use anyhow::Result;
use auth_gateway::{Application, Settings};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting auth gateway");

    let settings = Settings::new()?;
    let app = Application::new(settings)?;
    app.run().await?;

    Ok(())
}
