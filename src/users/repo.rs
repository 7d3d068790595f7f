use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::users::repo_types::{NewUser, Provider, User, UserPatch, UserStats};

/// Storage seam for the `users` table.
///
/// Mutating methods return `Ok(None)` when the row does not exist, so callers
/// decide between 404 and other outcomes. Violations of the email and
/// Google id unique indexes surface as distinct [`AppError::Conflict`]s.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, AppError>;
    async fn list(&self, limit: i64, offset: i64, active_only: bool) -> Result<Vec<User>, AppError>;
    async fn stats(&self) -> Result<UserStats, AppError>;
    async fn create(&self, new_user: NewUser) -> Result<User, AppError>;
    async fn update_profile(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, AppError>;
    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>, AppError>;
    /// Stores a new hash and bumps `token_version` in the same statement.
    async fn set_password(
        &self,
        id: Uuid,
        password_hash: &str,
        provider: Provider,
    ) -> Result<Option<User>, AppError>;
    async fn link_google(
        &self,
        id: Uuid,
        google_id: &str,
        provider: Provider,
    ) -> Result<Option<User>, AppError>;
    async fn bump_token_version(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

pub const EMAIL_INDEX: &str = "users_email_key";
pub const GOOGLE_ID_INDEX: &str = "users_google_id_key";

pub(crate) fn email_taken() -> AppError {
    AppError::Conflict("Email already exists".into())
}

pub(crate) fn google_id_taken() -> AppError {
    AppError::Conflict("Google account is already linked to another user".into())
}

fn unique_conflict(constraint: Option<&str>) -> AppError {
    match constraint {
        Some(EMAIL_INDEX) => email_taken(),
        Some(GOOGLE_ID_INDEX) => google_id_taken(),
        _ => AppError::Conflict("User already exists".into()),
    }
}

fn map_unique(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => unique_conflict(db.constraint()),
        _ => AppError::Database(e),
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, email, password_hash, google_id, provider,
                   is_active, phone, gender, token_version, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, email, password_hash, google_id, provider,
                   is_active, phone, gender, token_version, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, email, password_hash, google_id, provider,
                   is_active, phone, gender, token_version, created_at, updated_at
            FROM users
            WHERE google_id = $1
            "#,
        )
        .bind(google_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list(&self, limit: i64, offset: i64, active_only: bool) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, email, password_hash, google_id, provider,
                   is_active, phone, gender, token_version, created_at, updated_at
            FROM users
            WHERE ($1 = FALSE OR is_active)
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(active_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn stats(&self) -> Result<UserStats, AppError> {
        let (total, active): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active)
            FROM users
            "#,
        )
        .fetch_one(&self.db)
        .await?;
        Ok(UserStats {
            total,
            active,
            inactive: total - active,
        })
    }

    async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (first_name, last_name, email, password_hash, google_id,
                               provider, phone, gender)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, first_name, last_name, email, password_hash, google_id, provider,
                      is_active, phone, gender, token_version, created_at, updated_at
            "#,
        )
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.google_id)
        .bind(new_user.provider)
        .bind(&new_user.phone)
        .bind(new_user.gender)
        .fetch_one(&self.db)
        .await
        .map_err(map_unique)
    }

    async fn update_profile(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET first_name = COALESCE($2, first_name),
                   last_name  = COALESCE($3, last_name),
                   email      = COALESCE($4, email),
                   phone      = COALESCE($5, phone),
                   gender     = COALESCE($6, gender),
                   updated_at = NOW()
             WHERE id = $1
            RETURNING id, first_name, last_name, email, password_hash, google_id, provider,
                      is_active, phone, gender, token_version, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&patch.first_name)
        .bind(&patch.last_name)
        .bind(&patch.email)
        .bind(&patch.phone)
        .bind(patch.gender)
        .fetch_optional(&self.db)
        .await
        .map_err(map_unique)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET is_active = $2, updated_at = NOW()
             WHERE id = $1
            RETURNING id, first_name, last_name, email, password_hash, google_id, provider,
                      is_active, phone, gender, token_version, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(active)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_password(
        &self,
        id: Uuid,
        password_hash: &str,
        provider: Provider,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET password_hash = $2,
                   provider = $3,
                   token_version = token_version + 1,
                   updated_at = NOW()
             WHERE id = $1
            RETURNING id, first_name, last_name, email, password_hash, google_id, provider,
                      is_active, phone, gender, token_version, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .bind(provider)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn link_google(
        &self,
        id: Uuid,
        google_id: &str,
        provider: Provider,
    ) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET google_id = $2, provider = $3, updated_at = NOW()
             WHERE id = $1
            RETURNING id, first_name, last_name, email, password_hash, google_id, provider,
                      is_active, phone, gender, token_version, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(google_id)
        .bind(provider)
        .fetch_optional(&self.db)
        .await
        .map_err(map_unique)
    }

    async fn bump_token_version(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET token_version = token_version + 1, updated_at = NOW()
             WHERE id = $1
            RETURNING id, first_name, last_name, email, password_hash, google_id, provider,
                      is_active, phone, gender, token_version, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryUserRepository;
    use super::*;

    fn google_user(email: &str, sub: &str) -> NewUser {
        NewUser {
            first_name: "G".into(),
            last_name: "User".into(),
            email: email.into(),
            password_hash: None,
            google_id: Some(sub.into()),
            provider: Provider::Google,
            phone: None,
            gender: None,
        }
    }

    #[test]
    fn unique_violations_map_by_index() {
        let email = unique_conflict(Some(EMAIL_INDEX));
        assert!(matches!(email, AppError::Conflict(ref m) if m == "Email already exists"));
        let google = unique_conflict(Some(GOOGLE_ID_INDEX));
        assert!(matches!(google, AppError::Conflict(ref m) if m.contains("Google account")));
        assert!(matches!(unique_conflict(None), AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn memory_repo_enforces_google_id_uniqueness() {
        let repo = MemoryUserRepository::default();
        let first = repo.create(google_user("a@example.com", "sub-1")).await.unwrap();
        let err = repo.create(google_user("b@example.com", "sub-1")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("Google account")));

        let other = repo.create(google_user("c@example.com", "sub-2")).await.unwrap();
        let err = repo.link_google(other.id, "sub-1", Provider::Google).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let found = repo.find_by_google_id("sub-1").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert!(repo.find_by_google_id("sub-3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_repo_requires_password_unless_google_only() {
        let repo = MemoryUserRepository::default();
        let mut local = google_user("a@example.com", "sub-1");
        local.google_id = None;
        local.provider = Provider::Local;
        assert!(matches!(repo.create(local).await, Err(AppError::Internal(_))));

        let google = repo.create(google_user("b@example.com", "sub-2")).await.unwrap();
        let err = repo.link_google(google.id, "sub-2", Provider::Both).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
