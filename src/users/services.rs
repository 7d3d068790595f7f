use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::password::{hash_password, validate_strength, verify_password},
    error::AppError,
    state::AppState,
    users::{
        dto::{ChangePasswordRequest, CreateUserRequest, Pagination, UpdateUserRequest},
        repo_types::{NewUser, Provider, User, UserPatch, UserStats},
    },
};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 255;
pub const MAX_PHONE_LEN: usize = 20;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    email.len() <= MAX_EMAIL_LEN && EMAIL_RE.is_match(email)
}

/// Trims and lowercases, then checks the shape.
pub(crate) fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }
    Ok(email)
}

fn validate_name(field: &str, raw: &str) -> Result<String, AppError> {
    let value = raw.trim();
    if value.is_empty() || value.chars().count() > MAX_NAME_LEN {
        return Err(AppError::BadRequest(format!(
            "{} must be between 1 and {} characters",
            field, MAX_NAME_LEN
        )));
    }
    Ok(value.to_string())
}

fn validate_phone(raw: Option<String>) -> Result<Option<String>, AppError> {
    match raw.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()) {
        Some(p) if p.chars().count() > MAX_PHONE_LEN => Err(AppError::BadRequest(format!(
            "phone must be at most {} characters",
            MAX_PHONE_LEN
        ))),
        other => Ok(other),
    }
}

pub(crate) fn ensure_owner(caller: &User, target: Uuid, action: &str) -> Result<(), AppError> {
    if caller.id != target {
        warn!(caller = %caller.id, target_id = %target, action, "cross-account access denied");
        return Err(AppError::Forbidden(format!("You can only {}", action)));
    }
    Ok(())
}

/// Validates the payload and creates a local (password) account.
pub async fn create_local_user(state: &AppState, req: CreateUserRequest) -> Result<User, AppError> {
    let email = normalize_email(&req.email)?;
    let first_name = validate_name("firstName", &req.first_name)?;
    let last_name = validate_name("lastName", &req.last_name)?;
    validate_strength(&req.password)?;
    let phone = validate_phone(req.phone)?;

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email already exists".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let user = state
        .users
        .create(NewUser {
            first_name,
            last_name,
            email,
            password_hash: Some(password_hash),
            google_id: None,
            provider: Provider::Local,
            phone,
            gender: req.gender,
        })
        .await?;
    info!(user_id = %user.id, email = %user.email, "user created");
    Ok(user)
}

pub async fn get_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::user_not_found(id))
}

pub async fn list_users(
    state: &AppState,
    page: &Pagination,
    active_only: bool,
) -> Result<Vec<User>, AppError> {
    let (limit, offset) = page.clamped();
    state.users.list(limit, offset, active_only).await
}

pub async fn user_stats(state: &AppState) -> Result<UserStats, AppError> {
    state.users.stats().await
}

pub async fn update_user(
    state: &AppState,
    id: Uuid,
    req: UpdateUserRequest,
) -> Result<User, AppError> {
    let patch = UserPatch {
        first_name: req
            .first_name
            .as_deref()
            .map(|v| validate_name("firstName", v))
            .transpose()?,
        last_name: req
            .last_name
            .as_deref()
            .map(|v| validate_name("lastName", v))
            .transpose()?,
        email: req.email.as_deref().map(normalize_email).transpose()?,
        phone: validate_phone(req.phone)?,
        gender: req.gender,
    };

    if let Some(email) = &patch.email {
        if let Some(other) = state.users.find_by_email(email).await? {
            if other.id != id {
                warn!(email = %email, "email already taken");
                return Err(AppError::Conflict("Email already exists".into()));
            }
        }
    }

    state
        .users
        .update_profile(id, patch)
        .await?
        .ok_or_else(|| AppError::user_not_found(id))
}

pub async fn delete_user(state: &AppState, id: Uuid) -> Result<(), AppError> {
    if !state.users.delete(id).await? {
        return Err(AppError::user_not_found(id));
    }
    info!(user_id = %id, "user deleted");
    Ok(())
}

pub async fn set_active(state: &AppState, id: Uuid, active: bool) -> Result<User, AppError> {
    let user = state
        .users
        .set_active(id, active)
        .await?
        .ok_or_else(|| AppError::user_not_found(id))?;
    info!(user_id = %id, active, "user activation changed");
    Ok(user)
}

/// Sets a new password and bumps the token version, revoking every token
/// issued so far. Accounts without a password (Google-only) may set one
/// without a current password and become `both`.
pub async fn change_password(
    state: &AppState,
    id: Uuid,
    req: ChangePasswordRequest,
) -> Result<User, AppError> {
    let user = get_user(state, id).await?;

    if let Some(hash) = user.password_hash.as_deref() {
        let current = req.current_password.as_deref().unwrap_or_default();
        if current.is_empty() || !verify_password(current, hash)? {
            warn!(user_id = %id, "change password with wrong current password");
            return Err(AppError::BadRequest("Current password is incorrect".into()));
        }
    }
    validate_strength(&req.new_password)?;

    let new_hash = hash_password(&req.new_password)?;
    let provider = user.provider.with_password();
    let updated = state
        .users
        .set_password(id, &new_hash, provider)
        .await?
        .ok_or_else(|| AppError::user_not_found(id))?;
    info!(user_id = %id, provider = provider.as_str(), "password changed");
    Ok(updated)
}
