use tracing::{debug, info, warn};

use super::google::GoogleIdentity;
use super::password::verify_password;
use crate::{
    error::AppError,
    state::AppState,
    users::{
        repo_types::{NewUser, Provider, User},
        services::normalize_email,
    },
};

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".into())
}

/// Checks email and password. Unknown emails, wrong passwords and accounts
/// without a password all fail the same way.
pub async fn authenticate(state: &AppState, email: &str, password: &str) -> Result<User, AppError> {
    let email = normalize_email(email)?;

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(invalid_credentials());
    };

    let Some(hash) = user.password_hash.as_deref() else {
        warn!(user_id = %user.id, "password login on account without password");
        return Err(invalid_credentials());
    };

    if !verify_password(password, hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    Ok(user)
}

/// Finds or creates the local user for a verified Google identity.
///
/// The Google subject is matched first, so an account keeps its link after
/// an email change. Otherwise an existing account with the same email and no
/// Google id gets it attached and its provider promoted (`both` when it has
/// a password, `google` otherwise). Accounts already linked are returned
/// unchanged.
pub async fn link_google_identity(
    state: &AppState,
    identity: GoogleIdentity,
) -> Result<User, AppError> {
    if let Some(user) = state.users.find_by_google_id(&identity.google_id).await? {
        if user.email != identity.email {
            debug!(user_id = %user.id, "google sign-in for account with a changed email");
        }
        return Ok(user);
    }

    if let Some(user) = state.users.find_by_email(&identity.email).await? {
        if user.google_id.is_some() {
            if user.google_id.as_deref() != Some(identity.google_id.as_str()) {
                warn!(user_id = %user.id, "google sub differs from linked id");
            }
            return Ok(user);
        }
        let provider = Provider::with_google(user.has_password());
        let linked = state
            .users
            .link_google(user.id, &identity.google_id, provider)
            .await?
            .ok_or_else(|| AppError::user_not_found(user.id))?;
        info!(user_id = %linked.id, provider = provider.as_str(), "google identity linked");
        return Ok(linked);
    }

    let user = state
        .users
        .create(NewUser {
            first_name: identity.first_name,
            last_name: identity.last_name,
            email: identity.email,
            password_hash: None,
            google_id: Some(identity.google_id),
            provider: Provider::Google,
            phone: None,
            gender: None,
        })
        .await?;
    info!(user_id = %user.id, "user created from google sign-in");
    Ok(user)
}

pub async fn google_sign_in(state: &AppState, id_token: &str) -> Result<User, AppError> {
    if id_token.trim().is_empty() {
        return Err(AppError::BadRequest("idToken must not be empty".into()));
    }
    let identity = state.google.verify_id_token(id_token).await?;
    link_google_identity(state, identity).await
}

/// Bumps the token version so every token issued so far stops validating.
pub async fn revoke_all_tokens(state: &AppState, user: &User) -> Result<User, AppError> {
    let updated = state
        .users
        .bump_token_version(user.id)
        .await?
        .ok_or_else(|| AppError::user_not_found(user.id))?;
    info!(user_id = %user.id, token_version = updated.token_version, "all sessions revoked");
    Ok(updated)
}
