//! Key store abstraction.
//!
//! The validator only needs lookup plus the two mutations validation is
//! allowed to perform: binding an empty hwid slot and deactivating an
//! expired key. `provision` is the administrative seeding path.

mod db;
mod memory;

pub use db::DbStore;
pub use memory::MemoryStore;

use crate::{entity::key, prelude::*};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
  /// Device the key is locked to, `None` while unbound.
  pub hwid: Option<String>,
  pub active: bool,
  pub expiry: Option<DateTime>,
}

impl KeyRecord {
  #[cfg(test)]
  pub fn unbound() -> Self {
    Self { hwid: None, active: true, expiry: None }
  }

  pub fn is_bound(&self) -> bool {
    self.hwid.is_some()
  }

  pub fn is_expired(&self, now: DateTime) -> bool {
    self.expiry.is_some_and(|expiry| expiry < now)
  }
}

impl From<key::Model> for KeyRecord {
  fn from(model: key::Model) -> Self {
    Self {
      hwid: model.hwid.filter(|hwid| !hwid.is_empty()),
      active: model.active,
      expiry: model.expiry,
    }
  }
}

#[async_trait]
pub trait KeyStore: Send + Sync {
  fn name(&self) -> &'static str;

  async fn get(&self, key: &str) -> Result<Option<KeyRecord>>;

  /// Sets the hwid of an unbound key. Fails with `Error::AlreadyBound`
  /// without touching the record when the slot is taken.
  async fn bind(&self, key: &str, hwid: &str) -> Result<()>;

  /// Marks the key inactive. Idempotent.
  async fn deactivate(&self, key: &str) -> Result<()>;

  /// Inserts `record` unless `key` already exists. Returns whether a new
  /// record was created.
  async fn provision(&self, key: &str, record: KeyRecord) -> Result<bool>;
}
