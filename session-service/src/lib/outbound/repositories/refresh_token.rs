use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use sqlx::Postgres;
use sqlx::Transaction;
use uuid::Uuid;

use crate::domain::session::models::RefreshTokenRecord;
use crate::domain::session::models::RevocationReason;
use crate::domain::session::models::RotationOutcome;
use crate::domain::session::models::UserId;
use crate::outbound::repositories::user::store_error;
use crate::session::errors::StoreError;
use crate::session::ports::RefreshTokenRepository;

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    user_id: Uuid,
    token_digest: String,
    revoked: bool,
    revoked_reason: Option<String>,
    revoked_at: Option<DateTime<Utc>>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RefreshTokenRow> for RefreshTokenRecord {
    type Error = StoreError;

    fn try_from(r: RefreshTokenRow) -> Result<Self, Self::Error> {
        let revoked_reason = r
            .revoked_reason
            .as_deref()
            .map(str::parse::<RevocationReason>)
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("refresh token {}: {}", r.id, e)))?;

        Ok(RefreshTokenRecord {
            id: r.id,
            user_id: UserId(r.user_id),
            token_digest: r.token_digest,
            revoked: r.revoked,
            revoked_reason,
            revoked_at: r.revoked_at,
            expires_at: r.expires_at,
            created_at: r.created_at,
        })
    }
}

pub struct PostgresRefreshTokenRepository {
    pool: PgPool,
}

impl PostgresRefreshTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_in(
        tx: &mut Transaction<'_, Postgres>,
        record: &RefreshTokenRecord,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_digest, revoked, expires_at, created_at)
            VALUES ($1, $2, $3, FALSE, $4, $5)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id.0)
        .bind(&record.token_digest)
        .bind(record.expires_at)
        .bind(record.created_at)
        .execute(&mut **tx)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    /// Revoke every live record of a user inside the caller's transaction.
    pub(crate) async fn revoke_all_in(
        tx: &mut Transaction<'_, Postgres>,
        user_id: &UserId,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE, revoked_reason = $2, revoked_at = $3
            WHERE user_id = $1 AND revoked = FALSE
            "#,
        )
        .bind(user_id.0)
        .bind(reason.as_str())
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RefreshTokenRepository for PostgresRefreshTokenRepository {
    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        Self::insert_in(&mut tx, &record).await?;
        tx.commit().await.map_err(store_error)?;

        Ok(())
    }

    async fn find_by_digest(
        &self,
        digest: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT id, user_id, token_digest, revoked, revoked_reason, revoked_at,
                   expires_at, created_at
            FROM refresh_tokens
            WHERE token_digest = $1
            "#,
        )
        .bind(digest)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(RefreshTokenRecord::try_from).transpose()
    }

    async fn rotate(
        &self,
        digest: &str,
        successor: RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> Result<RotationOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        // The row lock serializes concurrent rotations of the same token.
        let current: Option<(bool, DateTime<Utc>)> = sqlx::query_as(
            "SELECT revoked, expires_at FROM refresh_tokens WHERE token_digest = $1 FOR UPDATE",
        )
        .bind(digest)
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_error)?;

        let outcome = match current {
            None => RotationOutcome::Missing,
            Some((true, _)) => RotationOutcome::NotLive,
            Some((false, expires_at)) if expires_at <= now => RotationOutcome::Expired,
            Some((false, _)) => RotationOutcome::Rotated,
        };
        if outcome != RotationOutcome::Rotated {
            tx.rollback().await.map_err(store_error)?;
            return Ok(outcome);
        }

        sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE, revoked_reason = $2, revoked_at = $3
            WHERE token_digest = $1 AND revoked = FALSE
            "#,
        )
        .bind(digest)
        .bind(RevocationReason::Rotated.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        Self::insert_in(&mut tx, &successor).await?;
        tx.commit().await.map_err(store_error)?;

        Ok(RotationOutcome::Rotated)
    }

    async fn revoke_one(
        &self,
        digest: &str,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE, revoked_reason = $2, revoked_at = $3
            WHERE token_digest = $1 AND revoked = FALSE
            "#,
        )
        .bind(digest)
        .bind(reason.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all(
        &self,
        user_id: &UserId,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        let revoked = Self::revoke_all_in(&mut tx, user_id, reason, now).await?;
        tx.commit().await.map_err(store_error)?;

        Ok(revoked)
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(result.rows_affected())
    }
}
