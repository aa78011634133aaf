use std::sync::Arc;

use axum::{
  Json,
  body::Bytes,
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
  prelude::*,
  state::AppState,
  verdict::{Grant, Locale, Rejection, Verdict},
};

#[derive(Debug, Deserialize)]
pub struct ValidateReq {
  #[serde(default)]
  pub key: Option<String>,
  #[serde(default)]
  pub hwid: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRes {
  pub valid: bool,
  pub reason: &'static str,
  pub message: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub hwid: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub first_activation: Option<bool>,
  /// Present on confirmed matches as an RFC 3339 UTC timestamp, `null` for
  /// keys without expiry.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expiry_date: Option<Option<String>>,
}

impl ValidateRes {
  pub fn new(verdict: &Verdict, locale: Locale) -> Self {
    let mut res = Self {
      valid: verdict.is_valid(),
      reason: verdict.reason(),
      message: verdict.message(locale),
      hwid: None,
      first_activation: None,
      expiry_date: None,
    };

    match verdict {
      Verdict::Valid(Grant::FirstBinding { hwid }) => {
        res.hwid = Some(hwid.clone());
        res.first_activation = Some(true);
      }
      Verdict::Valid(Grant::Confirmed { expiry }) => {
        res.expiry_date = Some(expiry.map(utils::format_timestamp));
      }
      Verdict::Invalid(_) => {}
    }
    res
  }

  pub fn unavailable(locale: Locale) -> Self {
    Self {
      valid: false,
      reason: "store_unavailable",
      message: locale.store_unavailable(),
      hwid: None,
      first_activation: None,
      expiry_date: None,
    }
  }
}

fn status(verdict: &Verdict) -> StatusCode {
  match verdict {
    Verdict::Valid(_) => StatusCode::OK,
    Verdict::Invalid(Rejection::MissingField | Rejection::MalformedRequest) => {
      StatusCode::BAD_REQUEST
    }
    Verdict::Invalid(Rejection::KeyNotFound) => StatusCode::NOT_FOUND,
    Verdict::Invalid(
      Rejection::Inactive | Rejection::Expired | Rejection::HwidMismatch,
    ) => StatusCode::FORBIDDEN,
  }
}

fn respond(verdict: Verdict, locale: Locale) -> (StatusCode, Json<ValidateRes>) {
  (status(&verdict), Json(ValidateRes::new(&verdict, locale)))
}

pub async fn validate(
  State(app): State<Arc<AppState>>,
  body: Bytes,
) -> Response {
  let locale = app.config.locale;

  // content type is not enforced, only the body shape
  let req = match json::from_slice::<ValidateReq>(&body) {
    Ok(req) => req,
    Err(err) => {
      error!("JSON parse error: {err}");
      return respond(Verdict::Invalid(Rejection::MalformedRequest), locale)
        .into_response();
    }
  };

  let key = req.key.unwrap_or_default();
  let hwid = req.hwid.unwrap_or_default();

  match app.sv().validator.validate(&key, &hwid).await {
    Ok(verdict) => respond(verdict, locale).into_response(),
    Err(err) if err.is_unavailable() => {
      error!("Validation of key {key} failed: {err}");
      (StatusCode::SERVICE_UNAVAILABLE, Json(ValidateRes::unavailable(locale)))
        .into_response()
    }
    Err(err) => {
      error!("Validation of key {key} failed: {err}");
      err.into_response()
    }
  }
}

pub async fn health() -> Json<json::Value> {
  Json(json::json!({
    "status": "alive",
    "service": env!("CARGO_PKG_NAME"),
    "version": env!("CARGO_PKG_VERSION"),
    "timestamp": Utc::now().to_rfc3339(),
    "endpoints": {
      "validate": "POST /validate",
      "health": "GET /health",
    },
  }))
}

pub async fn not_found() -> (StatusCode, Json<json::Value>) {
  (
    StatusCode::NOT_FOUND,
    Json(json::json!({
      "error": "Not Found",
      "message": "Use POST /validate with JSON body",
    })),
  )
}

#[cfg(test)]
mod tests {
  use axum::{
    body::{Body, to_bytes},
    http::{Request, header},
  };
  use json::Value;
  use tower::ServiceExt;

  use super::*;
  use crate::{
    plugins::server::router,
    state::Config,
    store::{KeyRecord, MemoryStore},
  };

  fn app() -> Arc<AppState> {
    let expired = KeyRecord {
      expiry: utils::parse_expiry("2020-01-01"),
      ..KeyRecord::unbound()
    };
    let dated = KeyRecord {
      hwid: Some("HW-DATED".into()),
      expiry: utils::parse_expiry("2099-12-31"),
      ..KeyRecord::unbound()
    };
    let store: MemoryStore = [
      ("123", KeyRecord::unbound()),
      ("456", expired),
      ("777", dated),
    ]
    .into_iter()
    .collect();

    Arc::new(AppState::with_store(Arc::new(store), Config::default()))
  }

  async fn call(
    app: &Arc<AppState>,
    method: &str,
    uri: &str,
    body: Option<&str>,
  ) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if body.is_some() {
      req = req.header(header::CONTENT_TYPE, "application/json");
    }
    let req = req.body(Body::from(body.unwrap_or_default().to_owned())).unwrap();

    let resp = router(app.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, json::from_slice(&bytes).unwrap())
  }

  #[tokio::test]
  async fn test_bind_then_mismatch() {
    let app = app();

    let (status, body) = call(
      &app,
      "POST",
      "/validate",
      Some(r#"{"key":"123","hwid":"AAAA111122223333"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["reason"], "first_binding");
    assert_eq!(body["hwid"], "AAAA111122223333");
    assert_eq!(body["firstActivation"], true);
    assert_eq!(body["message"], "Key berhasil ditautkan ke HWID ini");

    let (status, body) = call(
      &app,
      "POST",
      "/",
      Some(r#"{"key":"123","hwid":"AAAA111122223333"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reason"], "confirmed");
    assert!(body["expiryDate"].is_null());
    assert!(body.get("expiryDate").is_some());
    assert!(body.get("firstActivation").is_none());

    let (status, body) = call(
      &app,
      "POST",
      "/validate",
      Some(r#"{"key":"123","hwid":"ZZZZ000011112222"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["valid"], false);
    assert_eq!(body["reason"], "hwid_mismatch");
    assert!(body.get("hwid").is_none());
  }

  #[tokio::test]
  async fn test_json_without_content_type() {
    let app = app();

    let req = Request::builder()
      .method("POST")
      .uri("/validate")
      .body(Body::from(r#"{"key":"123","hwid":"AAAA111122223333"}"#))
      .unwrap();
    let resp = router(app.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = json::from_slice(&bytes).unwrap();
    assert_eq!(body["reason"], "first_binding");
    assert_eq!(body["firstActivation"], true);
  }

  #[tokio::test]
  async fn test_expiry_date_is_utc_timestamp() {
    let app = app();

    let (status, body) = call(
      &app,
      "POST",
      "/validate",
      Some(r#"{"key":"777","hwid":"HW-DATED"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reason"], "confirmed");
    assert_eq!(body["expiryDate"], "2099-12-31T00:00:00Z");
  }

  #[tokio::test]
  async fn test_expired_then_inactive() {
    let app = app();
    let body = Some(r#"{"key":"456","hwid":"HW1"}"#);

    let (status, res) = call(&app, "POST", "/validate", body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(res["reason"], "expired");

    let record = app.store.get("456").await.unwrap().unwrap();
    assert!(!record.active);

    let (status, res) = call(&app, "POST", "/validate", body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(res["reason"], "inactive");
  }

  #[tokio::test]
  async fn test_client_errors() {
    let app = app();

    let (status, res) =
      call(&app, "POST", "/validate", Some(r#"{"key":"123"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["reason"], "missing_field");

    let (status, res) =
      call(&app, "POST", "/validate", Some(r#"{"key":"","hwid":"X"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["reason"], "missing_field");

    let (status, res) =
      call(&app, "POST", "/validate", Some("not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["reason"], "malformed_request");

    let (status, res) =
      call(&app, "POST", "/validate", Some(r#"{"key":123,"hwid":"X"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["reason"], "malformed_request");

    let (status, res) = call(
      &app,
      "POST",
      "/validate",
      Some(r#"{"key":"nonexistent","hwid":"X"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(res["reason"], "key_not_found");
    assert_eq!(res["message"], "Key tidak ditemukan");

    assert!(!app.store.get("123").await.unwrap().unwrap().is_bound());
  }

  #[tokio::test]
  async fn test_health_and_fallback() {
    let app = app();

    for uri in ["/", "/health"] {
      let (status, res) = call(&app, "GET", uri, None).await;
      assert_eq!(status, StatusCode::OK);
      assert_eq!(res["status"], "alive");
      assert_eq!(res["endpoints"]["validate"], "POST /validate");
    }

    let (status, res) = call(&app, "GET", "/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(res["error"], "Not Found");
  }

  #[test]
  fn test_unavailable_payload() {
    let res = json::to_value(ValidateRes::unavailable(Locale::En)).unwrap();
    assert_eq!(res["valid"], false);
    assert_eq!(res["reason"], "store_unavailable");
    assert!(res.get("expiryDate").is_none());
  }
}
