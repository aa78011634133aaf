//! License key validation service
//!
//! Architecture:
//! - `store`: key records behind a swappable `KeyStore` (SeaORM/SQLite or
//!   in-memory)
//! - `sv::validator`: first-use hwid binding and lazy expiry state machine
//! - `plugins`: supervised HTTP server (axum) and lock-table janitor
//! - Tokio for async runtime

mod entity;
mod error;
mod plugins;
mod prelude;
mod state;
mod store;
mod sv;
mod utils;
mod verdict;

use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  prelude::*,
  state::{AppState, Config},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "keylock=debug,tower_http=debug,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = Config::from_env().context("Invalid configuration")?;

  info!("Starting keylock v{}", env!("CARGO_PKG_VERSION"));

  let app = Arc::new(AppState::new(config).await?);

  if let Some(path) = &app.config.seed_file {
    app
      .sv()
      .keys
      .seed_file(path)
      .await
      .with_context(|| format!("Failed to seed keys from {}", path.display()))?;
  } else {
    info!("No SEED_FILE configured, serving existing records only");
  }

  let services = plugins::App::new()
    .register(plugins::server::Plugin)
    .register(plugins::janitor::Janitor)
    .run(app);

  tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
  info!("Shutting down...");

  for service in services {
    service.abort();
  }
  Ok(())
}
