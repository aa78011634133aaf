//! Key/HWID validation.
//!
//! `decide` is the pure state machine over a single record. `Validator`
//! runs it against a store while holding the key's mutex, then applies the
//! mutation it asks for. Expiry is enforced on next access, not proactively:
//! a key past its expiry stays active in the store until someone validates
//! it.

use crate::{
  prelude::*,
  state::KeyLocks,
  store::{KeyRecord, KeyStore},
  verdict::{Grant, Rejection, Verdict},
};

/// Store change requested by a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
  Bind(String),
  Deactivate,
}

/// First matching rule wins: missing record, inactive, expired, unbound
/// (bind), mismatch, match.
pub fn decide(
  record: Option<&KeyRecord>,
  hwid: &str,
  now: DateTime,
) -> (Verdict, Option<Mutation>) {
  let Some(record) = record else {
    return (Verdict::Invalid(Rejection::KeyNotFound), None);
  };

  if !record.active {
    return (Verdict::Invalid(Rejection::Inactive), None);
  }

  // must precede the hwid rules: an expired key is never bindable
  if record.is_expired(now) {
    return (Verdict::Invalid(Rejection::Expired), Some(Mutation::Deactivate));
  }

  match record.hwid.as_deref() {
    None => (
      Verdict::Valid(Grant::FirstBinding { hwid: hwid.to_owned() }),
      Some(Mutation::Bind(hwid.to_owned())),
    ),
    Some(bound) if bound != hwid => {
      (Verdict::Invalid(Rejection::HwidMismatch), None)
    }
    Some(_) => {
      (Verdict::Valid(Grant::Confirmed { expiry: record.expiry }), None)
    }
  }
}

pub struct Validator<'a> {
  store: &'a dyn KeyStore,
  locks: &'a KeyLocks,
  timeout: Duration,
}

impl<'a> Validator<'a> {
  pub fn new(
    store: &'a dyn KeyStore,
    locks: &'a KeyLocks,
    timeout: Duration,
  ) -> Self {
    Self { store, locks, timeout }
  }

  pub async fn validate(&self, key: &str, hwid: &str) -> Result<Verdict> {
    self.validate_at(key, hwid, Utc::now().naive_utc()).await
  }

  pub async fn validate_at(
    &self,
    key: &str,
    hwid: &str,
    now: DateTime,
  ) -> Result<Verdict> {
    if key.is_empty() || hwid.is_empty() {
      warn!("Missing key or hwid");
      return Ok(Verdict::Invalid(Rejection::MissingField));
    }

    info!(
      "Validation request - key: {key}, hwid: {}...",
      utils::truncate(hwid, 10)
    );

    let _guard = time::timeout(self.timeout, self.locks.acquire(key))
      .await
      .map_err(|_| {
        Error::StoreUnavailable(format!(
          "key {key} stayed locked for {}",
          humantime::format_duration(self.timeout)
        ))
      })?;

    let record = self.bounded(self.store.get(key)).await?;
    let (verdict, mutation) = decide(record.as_ref(), hwid, now);

    let verdict = match mutation {
      None => verdict,
      Some(Mutation::Deactivate) => {
        match self.bounded(self.store.deactivate(key)).await {
          Ok(()) | Err(Error::KeyNotFound) => verdict,
          Err(err) => return Err(err),
        }
      }
      Some(Mutation::Bind(hwid)) => {
        match self.bounded(self.store.bind(key, &hwid)).await {
          Ok(()) => verdict,
          // removed by another process after the lookup
          Err(Error::KeyNotFound) => Verdict::Invalid(Rejection::KeyNotFound),
          // another process sharing the store bound it first
          Err(Error::AlreadyBound) => self.reevaluate(key, &hwid).await?,
          Err(err) => return Err(err),
        }
      }
    };

    self.report(key, hwid, &verdict);
    Ok(verdict)
  }

  async fn reevaluate(&self, key: &str, hwid: &str) -> Result<Verdict> {
    let record = self.bounded(self.store.get(key)).await?;

    Ok(match record {
      Some(record) if record.hwid.as_deref() == Some(hwid) => {
        Verdict::Valid(Grant::Confirmed { expiry: record.expiry })
      }
      Some(_) => Verdict::Invalid(Rejection::HwidMismatch),
      None => Verdict::Invalid(Rejection::KeyNotFound),
    })
  }

  async fn bounded<T>(
    &self,
    fut: impl Future<Output = Result<T>>,
  ) -> Result<T> {
    time::timeout(self.timeout, fut).await.map_err(|_| {
      Error::StoreUnavailable(format!(
        "{} store did not respond within {}",
        self.store.name(),
        humantime::format_duration(self.timeout)
      ))
    })?
  }

  fn report(&self, key: &str, hwid: &str, verdict: &Verdict) {
    match verdict {
      Verdict::Valid(Grant::FirstBinding { .. }) => {
        info!("Key {key} bound to HWID {}...", utils::truncate(hwid, 10));
      }
      Verdict::Valid(Grant::Confirmed { expiry }) => match expiry {
        Some(expiry) => info!(
          "Key {key} validated successfully, expires {}",
          utils::format_date(*expiry)
        ),
        None => info!("Key {key} validated successfully"),
      },
      Verdict::Invalid(Rejection::Expired) => {
        warn!("Key {key} expired, deactivated");
      }
      Verdict::Invalid(rejection) => {
        warn!("Rejected key {key}: {}", rejection.reason());
      }
    }
  }
}
