mod refresh_token;
mod user;

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub use refresh_token::{RefreshTokenRecord, RefreshTokenStore};
pub use user::{Role, User, UserStore, UserSummary};

/// Current Unix timestamp in seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        // An in-memory database exists per connection; a pool of more than
        // one would hand out empty databases for all but the migrated one.
        let max_connections = if path == ":memory:" { 1 } else { 5 };

        let options = SqliteConnectOptions::from_str(&url)?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                // Users table
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    first_name TEXT NOT NULL,
                    last_name TEXT NOT NULL,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT 'viewer',
                    created_at INTEGER NOT NULL DEFAULT (unixepoch())
                )",
                "CREATE INDEX idx_users_email ON users(email)",
                // Refresh tokens: one row per issued token, hash only
                "CREATE TABLE refresh_tokens (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    token_hash TEXT UNIQUE NOT NULL,
                    expires_at INTEGER NOT NULL,
                    revoked INTEGER NOT NULL DEFAULT 0,
                    created_at INTEGER NOT NULL DEFAULT (unixepoch())
                )",
                "CREATE INDEX idx_refresh_tokens_user_id ON refresh_tokens(user_id)",
                "CREATE INDEX idx_refresh_tokens_expires_at ON refresh_tokens(expires_at)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the refresh token store.
    pub fn refresh_tokens(&self) -> RefreshTokenStore {
        RefreshTokenStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .users()
            .create("alice@example.com", "Alice", "Smith", "hash", Role::Viewer)
            .await
            .unwrap();

        let user = db
            .users()
            .get_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.first_name, "Alice");
        assert_eq!(user.role, Role::Viewer);

        let user = db.users().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create("alice@example.com", "Alice", "Smith", "hash", Role::Viewer)
            .await
            .unwrap();
        let result = db
            .users()
            .create("alice@example.com", "Other", "Person", "hash", Role::Viewer)
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_email_availability() {
        let db = Database::open(":memory:").await.unwrap();

        assert!(
            db.users()
                .is_email_available("alice@example.com")
                .await
                .unwrap()
        );

        db.users()
            .create("alice@example.com", "Alice", "Smith", "hash", Role::Viewer)
            .await
            .unwrap();
        assert!(
            !db.users()
                .is_email_available("alice@example.com")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_list_users_ordered_and_sanitized() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create("b@example.com", "Bea", "Jones", "hash", Role::Team)
            .await
            .unwrap();
        db.users()
            .create("a@example.com", "Al", "Smith", "hash", Role::Admin)
            .await
            .unwrap();

        let users = db.users().list().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].email, "b@example.com");
        assert_eq!(users[0].role, Role::Team);
        assert_eq!(users[1].role, Role::Admin);
    }

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Admin, Role::Team, Role::Viewer] {
            assert_eq!(Role::from_str(role.as_str()), role);
        }
        // Unknown role strings degrade to the least-privileged role
        assert_eq!(Role::from_str("superuser"), Role::Viewer);
    }
}
