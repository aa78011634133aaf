pub mod janitor;
pub mod server;

use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::sleep};
use tracing::{error, info, warn};

use crate::state::AppState;

/// Long-running background service supervised by [`App`].
#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()>;
}

pub struct App {
  plugins: Vec<Arc<dyn Plugin>>,
  restart_delay: Duration,
}

impl App {
  pub fn new() -> Self {
    Self { plugins: Vec::new(), restart_delay: Duration::from_secs(5) }
  }

  pub fn register<P: Plugin + 'static>(mut self, plugin: P) -> Self {
    self.plugins.push(Arc::new(plugin));
    self
  }

  /// Spawns every plugin, restarting it after `restart_delay` whenever it
  /// returns or panics. Aborting a returned handle stops its supervisor.
  pub fn run(self, app: Arc<AppState>) -> Vec<JoinHandle<()>> {
    let delay = self.restart_delay;

    self
      .plugins
      .into_iter()
      .map(|plugin| {
        let app = app.clone();

        tokio::spawn(async move {
          let name = plugin.name();
          info!("SYSTEM: Service `{name}` initialized");

          loop {
            let app = app.clone();
            let plugin = plugin.clone();

            let handle = tokio::spawn(async move { plugin.start(app).await });

            match handle.await {
              Ok(Ok(())) => warn!("Service `{name}` stopped unexpectedly (Ok)."),
              Ok(Err(err)) => {
                error!("Service `{name}` crashed with error: {err:#}.")
              }
              Err(join_err) if join_err.is_cancelled() => {
                info!("Service `{name}` shutdown.");
                break;
              }
              Err(_) => error!("Service `{name}` PANICKED!"),
            }

            sleep(delay).await;
            info!("SYSTEM: Restarting service `{name}`...");
          }
        })
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;
  use crate::{state::Config, store::MemoryStore};

  struct Flaky(Arc<AtomicUsize>);

  #[async_trait::async_trait]
  impl Plugin for Flaky {
    fn name(&self) -> &'static str {
      "flaky"
    }

    async fn start(&self, _app: Arc<AppState>) -> anyhow::Result<()> {
      self.0.fetch_add(1, Ordering::SeqCst);
      anyhow::bail!("boom")
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_crashed_plugin_is_restarted() {
    let starts = Arc::new(AtomicUsize::new(0));
    let app =
      Arc::new(AppState::with_store(Arc::new(MemoryStore::new()), Config::default()));

    let handles = App::new().register(Flaky(starts.clone())).run(app);

    tokio::time::sleep(Duration::from_secs(12)).await;
    assert!(starts.load(Ordering::SeqCst) >= 3);

    for handle in handles {
      handle.abort();
    }
  }
}
