use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        ChangePasswordRequest, ChangePasswordResponse, CreateUserRequest, Pagination,
        PasswordStatusResponse, UpdateUserRequest, UserResponse,
    },
    repo_types::UserStats,
    services::{self, ensure_owner},
};
use crate::{
    auth::{extractors::AuthUser, jwt::JwtKeys, session},
    error::{AppError, AppJson, AppPath, AppQuery},
    state::AppState,
};

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/active", get(list_active_users))
        .route("/users/stats", get(stats))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/users/:id/deactivate", post(deactivate_user))
        .route("/users/:id/activate", post(activate_user))
        .route("/users/:id/change-password", post(change_password))
        .route("/users/:id/password-status", get(password_status))
}

fn to_responses(users: Vec<super::repo_types::User>) -> Json<Vec<UserResponse>> {
    Json(users.into_iter().map(UserResponse::from).collect())
}

#[instrument(skip(state, _caller))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    AppQuery(page): AppQuery<Pagination>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    Ok(to_responses(services::list_users(&state, &page, false).await?))
}

#[instrument(skip(state, _caller))]
pub async fn list_active_users(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    AppQuery(page): AppQuery<Pagination>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    Ok(to_responses(services::list_users(&state, &page, true).await?))
}

#[instrument(skip(state, _caller))]
pub async fn stats(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
) -> Result<Json<UserStats>, AppError> {
    Ok(Json(services::user_stats(&state).await?))
}

#[instrument(skip(state, _caller))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(services::get_user(&state, id).await?.into()))
}

#[instrument(skip(state, _caller, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = services::create_local_user(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, caller, payload), fields(caller = %caller.id))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    ensure_owner(&caller, id, "update your own profile")?;
    Ok(Json(services::update_user(&state, id, payload).await?.into()))
}

#[instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    ensure_owner(&caller, id, "delete your own account")?;
    services::delete_user(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn deactivate_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    ensure_owner(&caller, id, "deactivate your own account")?;
    Ok(Json(services::set_active(&state, id, false).await?.into()))
}

#[instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn activate_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    ensure_owner(&caller, id, "activate your own account")?;
    Ok(Json(services::set_active(&state, id, true).await?.into()))
}

/// Changes the password, revoking every earlier token, and hands the caller
/// a fresh session so this device stays signed in.
#[instrument(skip(state, jar, caller, payload), fields(caller = %caller.id))]
pub async fn change_password(
    State(state): State<AppState>,
    jar: CookieJar,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> Result<(CookieJar, Json<ChangePasswordResponse>), AppError> {
    ensure_owner(&caller, id, "change your own password")?;
    let user = services::change_password(&state, id, payload).await?;
    let keys = JwtKeys::from_ref(&state);
    let (jar, access_token) = session::issue(jar, &keys, &state.config.cookie, &user)?;
    Ok((
        jar,
        Json(ChangePasswordResponse {
            message: "Password changed successfully".into(),
            access_token,
        }),
    ))
}

#[instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn password_status(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<PasswordStatusResponse>, AppError> {
    ensure_owner(&caller, id, "check your own password status")?;
    let user = services::get_user(&state, id).await?;
    Ok(Json(PasswordStatusResponse {
        has_password: user.has_password(),
        provider: user.provider,
    }))
}
