//! Refresh token storage.
//!
//! One row per issued refresh token. Rows hold a SHA-256 digest of the raw
//! secret, never the secret itself. Revocation is a monotonic flag: a row
//! flips from 0 to 1 exactly once and never back, so a revoked row doubles
//! as the replay-detection record for its token value.

use sqlx::sqlite::SqlitePool;

/// A persisted refresh token record.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: i64,
    pub revoked: bool,
    pub created_at: i64,
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: i64,
    user_id: i64,
    token_hash: String,
    expires_at: i64,
    revoked: i64,
    created_at: i64,
}

impl From<RefreshTokenRow> for RefreshTokenRecord {
    fn from(row: RefreshTokenRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            revoked: row.revoked != 0,
            created_at: row.created_at,
        }
    }
}

/// Store for refresh token records.
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new refresh token record. Returns the record ID.
    ///
    /// `token_hash` carries a UNIQUE constraint; a digest collision surfaces
    /// as a database error and the issuance is rejected.
    pub async fn insert(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: i64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Look up a record by token hash.
    pub async fn get_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        let row: Option<RefreshTokenRow> = sqlx::query_as(
            "SELECT id, user_id, token_hash, expires_at, revoked, created_at FROM refresh_tokens WHERE token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(RefreshTokenRecord::from))
    }

    /// Mark a record as revoked. Idempotent: revoking an already-revoked or
    /// unknown record is a no-op.
    pub async fn revoke_by_id(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mark the record with this token hash as revoked. Idempotent.
    pub async fn revoke_by_hash(&self, token_hash: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Revoke every outstanding token for a user ("log out everywhere").
    /// Returns the number of rows newly revoked.
    pub async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ? AND revoked = 0")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Atomically consume `old_id` and insert its successor.
    ///
    /// The revoke is conditional on `revoked = 0`, so of any number of
    /// concurrent rotations presenting the same token exactly one spawns a
    /// successor. Returns `None` when the row was already consumed, in which
    /// case nothing is inserted. Both writes happen in one transaction: the
    /// store is never left with the old token revoked but no successor, nor
    /// with both usable.
    pub async fn rotate(
        &self,
        old_id: i64,
        user_id: i64,
        new_hash: &str,
        new_expires_at: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let revoked = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ? AND revoked = 0")
            .bind(old_id)
            .execute(&mut *tx)
            .await?;

        if revoked.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let inserted = sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(new_hash)
        .bind(new_expires_at)
        .execute(&mut *tx)
        .await?;

        let new_id = inserted.last_insert_rowid();
        tx.commit().await?;
        Ok(Some(new_id))
    }

    /// Delete rows past their expiry. Revoked rows are kept until they
    /// expire so replay detection keeps working for the whole token
    /// lifetime.
    pub async fn purge_expired(&self, now: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
