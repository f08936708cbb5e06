use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use sqlx::Postgres;
use uuid::Uuid;

use crate::domain::session::models::EmailAddress;
use crate::domain::session::models::RevocationReason;
use crate::domain::session::models::Role;
use crate::domain::session::models::TemporaryToken;
use crate::domain::session::models::TemporaryTokenKind;
use crate::domain::session::models::TokenEffect;
use crate::domain::session::models::User;
use crate::domain::session::models::UserId;
use crate::domain::session::models::Username;
use crate::outbound::repositories::refresh_token::PostgresRefreshTokenRepository;
use crate::session::errors::ProviderError;
use crate::session::errors::RoleError;
use crate::session::errors::StoreError;
use crate::session::ports::UserRepository;

const USER_COLUMNS: &str = r#"
    id, email, username, password_hash, login_type, provider_id, role, avatar_url,
    is_email_verified, is_active, last_login_at,
    email_verification_digest, email_verification_expires_at,
    password_reset_digest, password_reset_expires_at,
    created_at, updated_at
"#;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: Option<String>,
    password_hash: Option<String>,
    login_type: String,
    provider_id: Option<String>,
    role: String,
    avatar_url: Option<String>,
    is_email_verified: bool,
    is_active: bool,
    last_login_at: Option<DateTime<Utc>>,
    email_verification_digest: Option<String>,
    email_verification_expires_at: Option<DateTime<Utc>>,
    password_reset_digest: Option<String>,
    password_reset_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn temporary_token(
    digest: Option<String>,
    expires_at: Option<DateTime<Utc>>,
) -> Option<TemporaryToken> {
    match (digest, expires_at) {
        (Some(digest), Some(expires_at)) => Some(TemporaryToken { digest, expires_at }),
        _ => None,
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let id = r.id;
        let corrupt =
            |e: &dyn std::fmt::Display| StoreError::Corrupt(format!("user {}: {}", id, e));

        Ok(User {
            id: UserId(r.id),
            email: EmailAddress::new(r.email).map_err(|e| corrupt(&e))?,
            username: r
                .username
                .map(Username::new)
                .transpose()
                .map_err(|e| corrupt(&e))?,
            password_hash: r.password_hash,
            login_type: r.login_type.parse().map_err(|e: ProviderError| corrupt(&e))?,
            provider_id: r.provider_id,
            role: r.role.parse().map_err(|e: RoleError| corrupt(&e))?,
            avatar_url: r.avatar_url,
            is_email_verified: r.is_email_verified,
            is_active: r.is_active,
            last_login_at: r.last_login_at,
            email_verification: temporary_token(
                r.email_verification_digest,
                r.email_verification_expires_at,
            ),
            password_reset: temporary_token(r.password_reset_digest, r.password_reset_expires_at),
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Maps a driver error, keeping the constraint name of unique violations.
pub(crate) fn store_error(e: sqlx::Error) -> StoreError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(db_err.constraint().unwrap_or("unique").to_string());
        }
    }
    match e {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(e.to_string())
        }
        _ => StoreError::Transient(e.to_string()),
    }
}

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one<T>(&self, column: &str, value: T) -> Result<Option<User>, StoreError>
    where
        T: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + 'static,
    {
        let query = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, column);
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        row.map(User::try_from).transpose()
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: User) -> Result<User, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, username, password_hash, login_type, provider_id, role, avatar_url,
                is_email_verified, is_active, last_login_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(user.id.0)
        .bind(user.email.as_str())
        .bind(user.username.as_ref().map(Username::as_str))
        .bind(user.password_hash.as_deref())
        .bind(user.login_type.as_str())
        .bind(user.provider_id.as_deref())
        .bind(user.role.as_str())
        .bind(user.avatar_url.as_deref())
        .bind(user.is_email_verified)
        .bind(user.is_active)
        .bind(user.last_login_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        self.find_one("id", id.0).await
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, StoreError> {
        self.find_one("email", email.as_str().to_string()).await
    }

    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, StoreError> {
        self.find_one("username", username.as_str().to_string()).await
    }

    async fn record_login(&self, id: &UserId, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_login_at = $2, updated_at = $2 WHERE id = $1")
            .bind(id.0)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(())
    }

    async fn update_password(
        &self,
        id: &UserId,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<u64>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
                .bind(id.0)
                .bind(password_hash)
                .bind(at)
                .execute(&mut *tx)
                .await
                .map_err(store_error)?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let revoked = PostgresRefreshTokenRepository::revoke_all_in(
            &mut tx,
            id,
            RevocationReason::PasswordChanged,
            at,
        )
        .await?;
        tx.commit().await.map_err(store_error)?;

        Ok(Some(revoked))
    }

    async fn update_role(
        &self,
        id: &UserId,
        role: Role,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let query = format!(
            "UPDATE users SET role = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(id.0)
            .bind(role.as_str())
            .bind(at)
            .fetch_optional(&mut *tx)
            .await
            .map_err(store_error)?;
        let Some(row) = row else {
            return Ok(None);
        };

        let user = User::try_from(row)?;
        PostgresRefreshTokenRepository::revoke_all_in(
            &mut tx,
            id,
            RevocationReason::RoleChanged,
            at,
        )
        .await?;
        tx.commit().await.map_err(store_error)?;

        Ok(Some(user))
    }

    async fn store_temporary_token(
        &self,
        id: &UserId,
        kind: TemporaryTokenKind,
        token: &TemporaryToken,
    ) -> Result<bool, StoreError> {
        let query = format!(
            "UPDATE users SET {kind}_digest = $2, {kind}_expires_at = $3 WHERE id = $1",
            kind = kind.as_str()
        );
        let result = sqlx::query(&query)
            .bind(id.0)
            .bind(&token.digest)
            .bind(token.expires_at)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_temporary_token(
        &self,
        kind: TemporaryTokenKind,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let query = format!(
            "SELECT {columns} FROM users WHERE {kind}_digest = $1 AND {kind}_expires_at > $2",
            columns = USER_COLUMNS,
            kind = kind.as_str()
        );
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(digest)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        row.map(User::try_from).transpose()
    }

    async fn consume_temporary_token(
        &self,
        digest: &str,
        effect: &TokenEffect,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, StoreError> {
        // Clearing the slot and applying the effect in one conditional UPDATE makes
        // the first consumer win. A reset revokes the family in the same transaction.
        let query = match effect {
            TokenEffect::VerifyEmail => {
                r#"
                UPDATE users
                SET is_email_verified = TRUE,
                    email_verification_digest = NULL,
                    email_verification_expires_at = NULL,
                    updated_at = $2
                WHERE email_verification_digest = $1 AND email_verification_expires_at > $2
                RETURNING id
                "#
            }
            TokenEffect::ResetPassword { .. } => {
                r#"
                UPDATE users
                SET password_hash = $3,
                    password_reset_digest = NULL,
                    password_reset_expires_at = NULL,
                    updated_at = $2
                WHERE password_reset_digest = $1 AND password_reset_expires_at > $2
                RETURNING id
                "#
            }
        };

        let mut statement = sqlx::query_scalar::<_, Uuid>(query).bind(digest).bind(now);
        if let TokenEffect::ResetPassword { password_hash } = effect {
            statement = statement.bind(password_hash);
        }

        let mut tx = self.pool.begin().await.map_err(store_error)?;
        let Some(id) = statement
            .fetch_optional(&mut *tx)
            .await
            .map_err(store_error)?
            .map(UserId)
        else {
            return Ok(None);
        };

        if let TokenEffect::ResetPassword { .. } = effect {
            PostgresRefreshTokenRepository::revoke_all_in(
                &mut tx,
                &id,
                RevocationReason::PasswordChanged,
                now,
            )
            .await?;
        }
        tx.commit().await.map_err(store_error)?;

        Ok(Some(id))
    }
}
