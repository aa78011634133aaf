//! Administrative provisioning of key records.

use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;

use crate::{
  prelude::*,
  store::{KeyRecord, KeyStore},
};

/// One entry of a seed file, keyed by license key:
///
/// ```json
/// { "123": { "hwid": null, "active": true, "expiry": "2025-12-31" } }
/// ```
#[derive(Debug, Deserialize)]
pub struct SeedRecord {
  #[serde(default)]
  pub hwid: Option<String>,
  #[serde(default = "default_active")]
  pub active: bool,
  #[serde(default)]
  pub expiry: Option<String>,
}

fn default_active() -> bool {
  true
}

impl SeedRecord {
  fn into_record(self, key: &str) -> Result<KeyRecord> {
    let expiry = match self.expiry.as_deref().map(str::trim) {
      None | Some("") => None,
      Some(raw) => Some(utils::parse_expiry(raw).ok_or_else(|| {
        Error::Seed(format!("key `{key}`: unparseable expiry `{raw}`"))
      })?),
    };

    Ok(KeyRecord {
      hwid: self.hwid.filter(|hwid| !hwid.is_empty()),
      active: self.active,
      expiry,
    })
  }
}

pub struct Keys<'a> {
  store: &'a dyn KeyStore,
}

impl<'a> Keys<'a> {
  pub fn new(store: &'a dyn KeyStore) -> Self {
    Self { store }
  }

  pub async fn provision(&self, key: &str, record: KeyRecord) -> Result<bool> {
    if key.is_empty() {
      return Err(Error::Seed("empty license key".into()));
    }
    self.store.provision(key, record).await
  }

  /// Provisions every record that does not exist yet. All entries are
  /// checked before anything is written. Returns the number of new records.
  pub async fn seed(
    &self,
    records: BTreeMap<String, SeedRecord>,
  ) -> Result<usize> {
    let records = records
      .into_iter()
      .map(|(key, seed)| {
        if key.is_empty() {
          return Err(Error::Seed("empty license key".into()));
        }
        let record = seed.into_record(&key)?;
        Ok((key, record))
      })
      .collect::<Result<Vec<_>>>()?;

    let mut created = 0;
    for (key, record) in records {
      if self.provision(&key, record).await? {
        created += 1;
      } else {
        debug!("Key {key} already provisioned, skipping");
      }
    }
    Ok(created)
  }

  pub async fn seed_file(&self, path: &Path) -> Result<usize> {
    let raw = tokio::fs::read_to_string(path).await?;
    let records: BTreeMap<String, SeedRecord> = json::from_str(&raw)?;

    let total = records.len();
    let created = self.seed(records).await?;
    info!(
      "Seeded {created} new key(s) from {} ({total} in file)",
      path.display()
    );
    Ok(created)
  }
}
