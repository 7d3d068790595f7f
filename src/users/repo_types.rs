use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Where a user's identity comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "auth_provider", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Local,
    Google,
    Both,
}

impl Provider {
    /// Provider after a Google identity is attached to an account.
    pub fn with_google(has_password: bool) -> Self {
        if has_password {
            Provider::Both
        } else {
            Provider::Google
        }
    }

    /// Provider after a password is set on an account.
    pub fn with_password(self) -> Self {
        match self {
            Provider::Google => Provider::Both,
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Google => "google",
            Provider::Both => "both",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_gender", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: Option<String>, // Argon2 PHC string, never serialized
    pub google_id: Option<String>,
    pub provider: Provider,
    pub is_active: bool,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    pub token_version: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Insert payload; fields are already validated and normalized.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub provider: Provider,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
}

/// Partial profile update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_attach_promotes_password_accounts_to_both() {
        assert_eq!(Provider::with_google(true), Provider::Both);
        assert_eq!(Provider::with_google(false), Provider::Google);
    }

    #[test]
    fn setting_password_promotes_google_only() {
        assert_eq!(Provider::Google.with_password(), Provider::Both);
        assert_eq!(Provider::Local.with_password(), Provider::Local);
        assert_eq!(Provider::Both.with_password(), Provider::Both);
    }

    #[test]
    fn provider_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Provider::Both).unwrap(), "\"both\"");
        assert_eq!(Provider::Google.as_str(), "google");
    }
}
