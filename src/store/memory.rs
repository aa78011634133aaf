use super::{KeyRecord, KeyStore};
use crate::prelude::*;

/// Process-local store. Each mutation runs under the owning DashMap shard
/// lock, so check-and-set on the hwid slot is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
  keys: DashMap<String, KeyRecord>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl<K: Into<String>> FromIterator<(K, KeyRecord)> for MemoryStore {
  fn from_iter<I: IntoIterator<Item = (K, KeyRecord)>>(iter: I) -> Self {
    Self {
      keys: iter.into_iter().map(|(key, record)| (key.into(), record)).collect(),
    }
  }
}

#[async_trait]
impl KeyStore for MemoryStore {
  fn name(&self) -> &'static str {
    "memory"
  }

  async fn get(&self, key: &str) -> Result<Option<KeyRecord>> {
    Ok(self.keys.get(key).map(|record| record.value().clone()))
  }

  async fn bind(&self, key: &str, hwid: &str) -> Result<()> {
    let mut record = self.keys.get_mut(key).ok_or(Error::KeyNotFound)?;
    if record.is_bound() {
      return Err(Error::AlreadyBound);
    }
    record.hwid = Some(hwid.to_owned());
    Ok(())
  }

  async fn deactivate(&self, key: &str) -> Result<()> {
    let mut record = self.keys.get_mut(key).ok_or(Error::KeyNotFound)?;
    record.active = false;
    Ok(())
  }

  async fn provision(&self, key: &str, record: KeyRecord) -> Result<bool> {
    let mut created = false;
    self.keys.entry(key.to_owned()).or_insert_with(|| {
      created = true;
      record
    });
    Ok(created)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn store() -> MemoryStore {
    [
      ("123", KeyRecord::unbound()),
      (
        "789",
        KeyRecord { hwid: Some("HWID-FIXED-123".into()), ..KeyRecord::unbound() },
      ),
    ]
    .into_iter()
    .collect()
  }

  #[tokio::test]
  async fn test_get_missing_key() {
    assert_eq!(store().get("nonexistent").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_bind_once() {
    let store = store();

    store.bind("123", "DEVICE-A").await.unwrap();
    assert!(matches!(
      store.bind("123", "DEVICE-B").await,
      Err(Error::AlreadyBound)
    ));

    let record = store.get("123").await.unwrap().unwrap();
    assert_eq!(record.hwid.as_deref(), Some("DEVICE-A"));
  }

  #[tokio::test]
  async fn test_bind_bound_key_is_rejected() {
    let store = store();

    assert!(matches!(
      store.bind("789", "DEVICE-A").await,
      Err(Error::AlreadyBound)
    ));
    assert!(matches!(
      store.bind("nonexistent", "DEVICE-A").await,
      Err(Error::KeyNotFound)
    ));
  }

  #[tokio::test]
  async fn test_deactivate_is_idempotent() {
    let store = store();

    store.deactivate("123").await.unwrap();
    store.deactivate("123").await.unwrap();

    assert!(!store.get("123").await.unwrap().unwrap().active);
  }

  #[tokio::test]
  async fn test_provision_never_overwrites() {
    let store = store();

    assert!(store.provision("456", KeyRecord::unbound()).await.unwrap());

    let replacement = KeyRecord { active: false, ..KeyRecord::unbound() };
    assert!(!store.provision("789", replacement).await.unwrap());

    let record = store.get("789").await.unwrap().unwrap();
    assert!(record.active);
    assert_eq!(record.hwid.as_deref(), Some("HWID-FIXED-123"));
  }
}
