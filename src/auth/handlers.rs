use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use tracing::{info, instrument};

use super::{
    dto::{AuthResponse, GoogleLoginRequest, LoginRequest, MessageResponse},
    extractors::AuthUser,
    jwt::JwtKeys,
    services, session,
};
use crate::{
    error::{AppError, AppJson},
    state::AppState,
    users::{dto::{CreateUserRequest, UserResponse}, repo_types::User, services::create_local_user},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/logout-all-devices", post(logout_all_devices))
        .route("/auth/me", get(me))
        .route("/auth/google", post(google))
}

fn signed_in(
    state: &AppState,
    jar: CookieJar,
    user: User,
    message: &str,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let keys = JwtKeys::from_ref(state);
    let (jar, access_token) = session::issue(jar, &keys, &state.config.cookie, &user)?;
    Ok((
        jar,
        Json(AuthResponse {
            user: user.into(),
            access_token,
            message: message.into(),
        }),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), AppError> {
    let user = create_local_user(&state, payload).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    let (jar, body) = signed_in(&state, jar, user, "Registration successful")?;
    Ok((StatusCode::CREATED, jar, body))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let user = services::authenticate(&state, &payload.email, &payload.password).await?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    signed_in(&state, jar, user, "Login successful")
}

#[instrument(skip(state, jar, payload))]
pub async fn google(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<GoogleLoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let user = services::google_sign_in(&state, &payload.id_token).await?;
    info!(user_id = %user.id, provider = user.provider.as_str(), "google sign-in");
    signed_in(&state, jar, user, "Login successful")
}

/// Clears this browser's cookie only. Tokens held elsewhere stay valid.
#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    (
        session::clear(jar, &state.config.cookie),
        Json(MessageResponse::new("Logged out successfully")),
    )
}

#[instrument(skip(state, jar, user), fields(user_id = %user.id))]
pub async fn logout_all_devices(
    State(state): State<AppState>,
    jar: CookieJar,
    AuthUser(user): AuthUser,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    services::revoke_all_tokens(&state, &user).await?;
    Ok((
        session::clear(jar, &state.config.cookie),
        Json(MessageResponse::new("Logged out from all devices")),
    ))
}

#[instrument(skip(user), fields(user_id = %user.id))]
pub async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.into())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::testing::{register, registration, send, test_app, Auth};

    #[tokio::test]
    async fn register_sets_cookie_and_returns_user() {
        let (_, app) = test_app();
        let resp = send(
            &app,
            "POST",
            "/auth/register",
            Auth::None,
            Some(registration("Ada@Example.com", "Passw0rd!")),
        )
        .await;
        assert_eq!(resp.status, StatusCode::CREATED);
        assert_eq!(resp.body["user"]["email"], "ada@example.com");
        assert_eq!(resp.body["user"]["provider"], "local");
        assert!(resp.body["user"].get("passwordHash").is_none());
        let cookie = resp.set_cookie.clone().expect("cookie set");
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert_eq!(resp.cookie_token().as_deref(), resp.body["access_token"].as_str());
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let (_, app) = test_app();
        register(&app, "ada@example.com", "Passw0rd!").await;
        let resp = send(
            &app,
            "POST",
            "/auth/register",
            Auth::None,
            Some(registration("ADA@example.com", "Other1Pass")),
        )
        .await;
        assert_eq!(resp.status, StatusCode::CONFLICT);
        assert_eq!(resp.body["statusCode"], 409);
        assert_eq!(resp.body["message"], "Email already exists");
    }

    #[tokio::test]
    async fn weak_password_and_bad_body_are_bad_request() {
        let (_, app) = test_app();
        let resp = send(&app, "POST", "/auth/register", Auth::None, Some(registration("a@b.co", "short"))).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);

        let resp = send(&app, "POST", "/auth/register", Auth::None, Some(json!({"email": "a@b.co"}))).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_correct_and_incorrect_password() {
        let (_, app) = test_app();
        register(&app, "ada@example.com", "Passw0rd!").await;

        let ok = send(
            &app,
            "POST",
            "/auth/login",
            Auth::None,
            Some(json!({"email": "ada@example.com", "password": "Passw0rd!"})),
        )
        .await;
        assert_eq!(ok.status, StatusCode::OK);
        assert_eq!(ok.body["message"], "Login successful");
        assert!(ok.cookie_token().is_some());

        let bad = send(
            &app,
            "POST",
            "/auth/login",
            Auth::None,
            Some(json!({"email": "ada@example.com", "password": "Wrong1pass"})),
        )
        .await;
        assert_eq!(bad.status, StatusCode::UNAUTHORIZED);
        assert_eq!(bad.body["message"], "Invalid credentials");
    }

    #[tokio::test]
    async fn me_accepts_cookie_or_bearer() {
        let (_, app) = test_app();
        let (id, token) = register(&app, "ada@example.com", "Passw0rd!").await;

        let via_cookie = send(&app, "GET", "/auth/me", Auth::Cookie(&token), None).await;
        assert_eq!(via_cookie.status, StatusCode::OK);
        assert_eq!(via_cookie.body["id"], id.to_string());

        let via_bearer = send(&app, "GET", "/auth/me", Auth::Bearer(&token), None).await;
        assert_eq!(via_bearer.status, StatusCode::OK);

        let anonymous = send(&app, "GET", "/auth/me", Auth::None, None).await;
        assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

        let garbage = send(&app, "GET", "/auth/me", Auth::Bearer("not-a-jwt"), None).await;
        assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_clears_cookie_without_revoking() {
        let (_, app) = test_app();
        let (_, token) = register(&app, "ada@example.com", "Passw0rd!").await;

        let resp = send(&app, "POST", "/auth/logout", Auth::None, None).await;
        assert_eq!(resp.status, StatusCode::OK);
        let cookie = resp.set_cookie.expect("removal cookie");
        assert!(cookie.starts_with("access_token="));
        assert!(cookie.contains("Max-Age=0"));

        let still = send(&app, "GET", "/auth/me", Auth::Bearer(&token), None).await;
        assert_eq!(still.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn logout_all_devices_invalidates_every_token() {
        let (_, app) = test_app();
        let (_, first) = register(&app, "ada@example.com", "Passw0rd!").await;
        let second = send(
            &app,
            "POST",
            "/auth/login",
            Auth::None,
            Some(json!({"email": "ada@example.com", "password": "Passw0rd!"})),
        )
        .await
        .body["access_token"]
            .as_str()
            .unwrap()
            .to_string();

        let resp = send(&app, "POST", "/auth/logout-all-devices", Auth::Cookie(&first), None).await;
        assert_eq!(resp.status, StatusCode::OK);

        for token in [&first, &second] {
            let me = send(&app, "GET", "/auth/me", Auth::Bearer(token), None).await;
            assert_eq!(me.status, StatusCode::UNAUTHORIZED);
        }

        let fresh = send(
            &app,
            "POST",
            "/auth/login",
            Auth::None,
            Some(json!({"email": "ada@example.com", "password": "Passw0rd!"})),
        )
        .await;
        let token = fresh.body["access_token"].as_str().unwrap();
        let me = send(&app, "GET", "/auth/me", Auth::Bearer(token), None).await;
        assert_eq!(me.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn google_links_local_account_as_both() {
        let (_, app) = test_app();
        let (id, _) = register(&app, "ada@example.com", "Passw0rd!").await;

        let resp = send(
            &app,
            "POST",
            "/auth/google",
            Auth::None,
            Some(json!({"idToken": "valid:sub-1:ada@example.com:Ada:L"})),
        )
        .await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body["user"]["id"], id.to_string());
        assert_eq!(resp.body["user"]["provider"], "both");
        assert!(resp.cookie_token().is_some());
    }

    #[tokio::test]
    async fn google_sign_in_follows_account_after_email_change() {
        let (state, app) = test_app();
        let google = json!({"idToken": "valid:sub-S:a@example.com:Ann:Lee"});
        let first = send(&app, "POST", "/auth/google", Auth::None, Some(google.clone())).await;
        assert_eq!(first.status, StatusCode::OK);
        let id = first.body["user"]["id"].as_str().unwrap().to_string();
        let token = first.cookie_token().unwrap();

        let renamed = send(
            &app,
            "PATCH",
            &format!("/users/{}", id),
            Auth::Bearer(&token),
            Some(json!({"email": "renamed@example.com"})),
        )
        .await;
        assert_eq!(renamed.status, StatusCode::OK);

        let second = send(&app, "POST", "/auth/google", Auth::None, Some(google)).await;
        assert_eq!(second.status, StatusCode::OK);
        assert_eq!(second.body["user"]["id"], id.as_str());
        assert_eq!(second.body["user"]["email"], "renamed@example.com");
        assert_eq!(state.users.stats().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn google_creates_account_and_rejects_bad_tokens() {
        let (_, app) = test_app();
        let resp = send(
            &app,
            "POST",
            "/auth/google",
            Auth::None,
            Some(json!({"idToken": "valid:sub-9:grace@example.com:Grace:Hopper"})),
        )
        .await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body["user"]["provider"], "google");
        assert_eq!(resp.body["user"]["firstName"], "Grace");

        let bad = send(&app, "POST", "/auth/google", Auth::None, Some(json!({"idToken": "forged"}))).await;
        assert_eq!(bad.status, StatusCode::UNAUTHORIZED);
    }
}
