use crate::{prelude::*, state::AppState};

/// Periodically drops per-key mutexes that nobody holds, so the lock table
/// only grows with keys under active validation.
pub struct Janitor;

#[async_trait]
impl super::Plugin for Janitor {
  fn name(&self) -> &'static str {
    "janitor"
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let mut interval = time::interval(app.config.lock_gc_interval);
    loop {
      interval.tick().await;

      let removed = app.locks.gc();
      if removed > 0 {
        debug!("Dropped {removed} idle key lock(s), {} left", app.locks.len());
      }
    }
  }
}
