use std::{path::PathBuf, str::FromStr};

use migration::{Migrator, MigratorTrait};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
  prelude::*,
  store::{DbStore, KeyStore, MemoryStore},
  sv,
  verdict::Locale,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backend {
  #[default]
  Database,
  Memory,
}

impl FromStr for Backend {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> anyhow::Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "database" | "db" | "sqlite" => Ok(Backend::Database),
      "memory" | "mem" => Ok(Backend::Memory),
      other => anyhow::bail!("Unknown store backend `{other}`"),
    }
  }
}

#[derive(Debug, Clone)]
pub struct Config {
  pub port: u16,
  pub backend: Backend,
  pub database_url: String,
  pub seed_file: Option<PathBuf>,
  /// Upper bound for every single store call made during validation.
  pub store_timeout: Duration,
  pub lock_gc_interval: Duration,
  pub locale: Locale,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      port: 3000,
      backend: Backend::Database,
      database_url: String::from("sqlite:keys.db?mode=rwc"),
      seed_file: None,
      store_timeout: Duration::from_secs(2),
      lock_gc_interval: Duration::from_secs(60),
      locale: Locale::Id,
    }
  }
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  pub fn from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
  ) -> anyhow::Result<Self> {
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let duration = |name: &str| -> anyhow::Result<Option<Duration>> {
      var(name)
        .map(|raw| {
          humantime::parse_duration(raw.trim())
            .with_context(|| format!("Invalid {name} `{raw}`"))
        })
        .transpose()
    };

    let mut config = Config::default();

    if let Some(port) = var("PORT") {
      config.port =
        port.trim().parse().with_context(|| format!("Invalid PORT `{port}`"))?;
    }
    if let Some(backend) = var("STORE_BACKEND") {
      config.backend = backend.parse()?;
    }
    if let Some(url) = var("DATABASE_URL") {
      config.database_url = url;
    }
    if let Some(locale) = var("LOCALE") {
      config.locale = locale.parse()?;
    }
    if let Some(timeout) = duration("STORE_TIMEOUT")? {
      config.store_timeout = timeout;
    }
    if let Some(interval) = duration("LOCK_GC_INTERVAL")? {
      config.lock_gc_interval = interval;
    }
    config.seed_file = var("SEED_FILE").map(PathBuf::from);

    anyhow::ensure!(!config.store_timeout.is_zero(), "STORE_TIMEOUT must be > 0");
    anyhow::ensure!(
      !config.lock_gc_interval.is_zero(),
      "LOCK_GC_INTERVAL must be > 0"
    );

    Ok(config)
  }
}

/// One mutex per license key, created on demand. Validation holds the key's
/// mutex across lookup, decision and mutation.
#[derive(Debug, Default)]
pub struct KeyLocks {
  locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLocks {
  pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
    let lock = self.locks.entry(key.to_owned()).or_default().value().clone();
    lock.lock_owned().await
  }

  /// Drops mutexes nobody holds or waits on. Returns how many were removed.
  pub fn gc(&self) -> usize {
    let before = self.locks.len();
    self.locks.retain(|_key, lock| Arc::strong_count(lock) > 1);
    before.saturating_sub(self.locks.len())
  }

  pub fn len(&self) -> usize {
    self.locks.len()
  }
}

pub struct Services<'a> {
  pub keys: sv::Keys<'a>,
  pub validator: sv::Validator<'a>,
}

pub struct AppState {
  pub store: Arc<dyn KeyStore>,
  pub locks: KeyLocks,
  pub config: Config,
}

impl AppState {
  pub async fn new(config: Config) -> anyhow::Result<Self> {
    let store: Arc<dyn KeyStore> = match config.backend {
      Backend::Memory => {
        warn!("Using in-memory key store, bindings are lost on restart");
        Arc::new(MemoryStore::new())
      }
      Backend::Database => {
        info!("Connecting to database...");
        let db = Database::connect(config.database_url.as_str())
          .await
          .context("Failed to connect to database")?;

        info!("Running migrations...");
        Migrator::up(&db, None).await.context("Failed to run migrations")?;

        Arc::new(DbStore::new(db))
      }
    };

    Ok(Self::with_store(store, config))
  }

  pub fn with_store(store: Arc<dyn KeyStore>, config: Config) -> Self {
    Self { store, locks: KeyLocks::default(), config }
  }

  pub fn sv(&self) -> Services<'_> {
    Services {
      keys: sv::Keys::new(self.store.as_ref()),
      validator: sv::Validator::new(
        self.store.as_ref(),
        &self.locks,
        self.config.store_timeout,
      ),
    }
  }
}
