//! Shared helpers for router and unit tests.

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use serde_json::Value;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    app::build_app,
    state::AppState,
    users::repo_types::{Provider, User},
};

pub fn sample_user(email: &str) -> User {
    let now = OffsetDateTime::now_utc();
    User {
        id: Uuid::new_v4(),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: email.into(),
        password_hash: None,
        google_id: None,
        provider: Provider::Local,
        is_active: true,
        phone: None,
        gender: None,
        token_version: 0,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_app() -> (AppState, Router) {
    let state = AppState::fake();
    let app = build_app(state.clone()).expect("router builds");
    (state, app)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub set_cookie: Option<String>,
    pub body: Value,
}

impl TestResponse {
    /// Value of the `access_token` cookie set by the response, if any.
    pub fn cookie_token(&self) -> Option<String> {
        let raw = self.set_cookie.as_deref()?;
        let pair = raw.split(';').next()?;
        let value = pair.strip_prefix("access_token=")?;
        (!value.is_empty()).then(|| value.to_string())
    }
}

async fn read(resp: Response<Body>) -> TestResponse {
    let status = resp.status();
    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    TestResponse {
        status,
        set_cookie,
        body,
    }
}

pub enum Auth<'a> {
    None,
    Cookie(&'a str),
    Bearer(&'a str),
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    auth: Auth<'_>,
    body: Option<Value>,
) -> TestResponse {
    let mut req = Request::builder().method(method).uri(uri);
    req = match auth {
        Auth::None => req,
        Auth::Cookie(t) => req.header(header::COOKIE, format!("access_token={}", t)),
        Auth::Bearer(t) => req.header(header::AUTHORIZATION, format!("Bearer {}", t)),
    };
    let req = match body {
        Some(json) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => req.body(Body::empty()),
    }
    .expect("request");
    let resp = app.clone().oneshot(req).await.expect("infallible");
    read(resp).await
}

pub fn registration(email: &str, password: &str) -> Value {
    serde_json::json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": email,
        "password": password,
    })
}

/// Registers a user and returns `(user id, access token)`.
pub async fn register(app: &Router, email: &str, password: &str) -> (Uuid, String) {
    let resp = send(app, "POST", "/auth/register", Auth::None, Some(registration(email, password))).await;
    assert_eq!(resp.status, StatusCode::CREATED, "register failed: {}", resp.body);
    let id = resp.body["user"]["id"].as_str().expect("user id").parse().expect("uuid");
    let token = resp.body["access_token"].as_str().expect("token").to_string();
    (id, token)
}
