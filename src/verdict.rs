//! Validation outcomes, their reason codes and localized messages.
//!
//! Reason codes are the stable contract with clients; message text depends
//! on the deployment locale.

use std::{fmt, str::FromStr};

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
  /// `key` or `hwid` missing or empty.
  MissingField,
  /// Body is not a JSON object of the expected shape.
  MalformedRequest,
  KeyNotFound,
  Inactive,
  /// Expiry passed; detection deactivates the key.
  Expired,
  /// Key is already locked to another device.
  HwidMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
  /// The key was unbound and is now locked to `hwid`.
  FirstBinding { hwid: String },
  Confirmed { expiry: Option<DateTime> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
  Valid(Grant),
  Invalid(Rejection),
}

impl Verdict {
  pub fn is_valid(&self) -> bool {
    matches!(self, Verdict::Valid(_))
  }

  pub fn reason(&self) -> &'static str {
    match self {
      Verdict::Valid(Grant::FirstBinding { .. }) => "first_binding",
      Verdict::Valid(Grant::Confirmed { .. }) => "confirmed",
      Verdict::Invalid(rejection) => rejection.reason(),
    }
  }

  pub fn message(&self, locale: Locale) -> &'static str {
    match self {
      Verdict::Valid(Grant::FirstBinding { .. }) => match locale {
        Locale::Id => "Key berhasil ditautkan ke HWID ini",
        Locale::En => "Key successfully bound to this HWID",
      },
      Verdict::Valid(Grant::Confirmed { .. }) => match locale {
        Locale::Id => "Key valid dan HWID cocok",
        Locale::En => "Key is valid and HWID matches",
      },
      Verdict::Invalid(rejection) => rejection.message(locale),
    }
  }
}

impl Rejection {
  pub fn reason(self) -> &'static str {
    match self {
      Rejection::MissingField => "missing_field",
      Rejection::MalformedRequest => "malformed_request",
      Rejection::KeyNotFound => "key_not_found",
      Rejection::Inactive => "inactive",
      Rejection::Expired => "expired",
      Rejection::HwidMismatch => "hwid_mismatch",
    }
  }

  pub fn message(self, locale: Locale) -> &'static str {
    use Rejection::*;

    match (locale, self) {
      (Locale::Id, MissingField) => "Key dan HWID harus diisi",
      (Locale::Id, MalformedRequest) => {
        "Invalid request format. Use JSON with 'key' and 'hwid'"
      }
      (Locale::Id, KeyNotFound) => "Key tidak ditemukan",
      (Locale::Id, Inactive) => "Key sudah tidak aktif",
      (Locale::Id, Expired) => "Key sudah expired",
      (Locale::Id, HwidMismatch) => {
        "HWID tidak cocok. Key sudah tertaut ke perangkat lain"
      }
      (Locale::En, MissingField) => "Key and HWID are required",
      (Locale::En, MalformedRequest) => {
        "Invalid request format. Use JSON with 'key' and 'hwid'"
      }
      (Locale::En, KeyNotFound) => "Key not found",
      (Locale::En, Inactive) => "Key is no longer active",
      (Locale::En, Expired) => "Key has expired",
      (Locale::En, HwidMismatch) => {
        "HWID mismatch. Key is already bound to another device"
      }
    }
  }
}

impl fmt::Display for Verdict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.reason())
  }
}

/// Language of human-readable messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Locale {
  #[default]
  Id,
  En,
}

impl Locale {
  pub fn store_unavailable(self) -> &'static str {
    match self {
      Locale::Id => "Layanan penyimpanan key sedang tidak tersedia",
      Locale::En => "Key store is currently unavailable",
    }
  }
}

impl FromStr for Locale {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> anyhow::Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "id" | "id-id" => Ok(Locale::Id),
      "en" | "en-us" | "en-gb" => Ok(Locale::En),
      other => anyhow::bail!("Unsupported locale `{other}`"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reason_codes_are_stable() {
    let first = Verdict::Valid(Grant::FirstBinding { hwid: "X".into() });
    let confirmed = Verdict::Valid(Grant::Confirmed { expiry: None });

    assert_eq!(first.reason(), "first_binding");
    assert_eq!(confirmed.reason(), "confirmed");
    assert_eq!(Verdict::Invalid(Rejection::Expired).reason(), "expired");
    assert_eq!(
      Verdict::Invalid(Rejection::HwidMismatch).to_string(),
      "hwid_mismatch"
    );
  }

  #[test]
  fn reference_messages_are_indonesian() {
    let verdict = Verdict::Invalid(Rejection::KeyNotFound);
    assert_eq!(verdict.message(Locale::default()), "Key tidak ditemukan");
    assert_eq!(verdict.message(Locale::En), "Key not found");
  }

  #[test]
  fn locale_parsing() {
    assert_eq!("ID".parse::<Locale>().unwrap(), Locale::Id);
    assert_eq!("en-US".parse::<Locale>().unwrap(), Locale::En);
    assert!("fr".parse::<Locale>().is_err());
  }
}
