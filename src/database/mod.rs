use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{migrate::MigrateDatabase, Executor, Pool, Sqlite};
use tracing::info;

use crate::assets::MigrationAssets;
use crate::config::DatabaseConfig;
use crate::errors::{AppResult, RepositoryError};

pub mod channels;
pub mod guides;

/// SQLite-backed store for channels and guides
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub fn pool(&self) -> Pool<Sqlite> {
        self.pool.clone()
    }

    pub async fn new(config: &DatabaseConfig) -> AppResult<Self> {
        let in_memory = config.url.contains(":memory:");

        // Create database if it doesn't exist
        if !in_memory && !Sqlite::database_exists(&config.url).await? {
            Sqlite::create_database(&config.url).await?;
        }

        // Every connection to an in-memory database sees its own copy
        let max_connections = if in_memory {
            1
        } else {
            config.max_connections.unwrap_or(10)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> AppResult<()> {
        self.pool
            .execute(
                r#"
                CREATE TABLE IF NOT EXISTS _migrations (
                    version INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    installed_on TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                )
                "#,
            )
            .await?;

        for (name, content) in MigrationAssets::get_migrations() {
            // "001_initial_schema.sql" -> 1
            let version: i64 = name
                .split('_')
                .next()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| RepositoryError::MigrationFailed {
                    version: name.clone(),
                    message: "file name must start with a numeric version".to_string(),
                })?;

            let applied = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM _migrations WHERE version = ?",
            )
            .bind(version)
            .fetch_one(&self.pool)
            .await?;
            if applied > 0 {
                continue;
            }

            let start = std::time::Instant::now();
            let mut transaction = self.pool.begin().await?;

            if let Err(e) = (&mut *transaction).execute(content.as_str()).await {
                transaction.rollback().await?;
                return Err(RepositoryError::MigrationFailed {
                    version: name,
                    message: e.to_string(),
                }
                .into());
            }

            sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
                .bind(version)
                .bind(&name)
                .execute(&mut *transaction)
                .await?;
            transaction.commit().await?;

            info!(
                "Applied migration: {} ({}ms)",
                name,
                start.elapsed().as_millis()
            );
        }

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::memory_database;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = memory_database().await;
        db.migrate().await.unwrap();

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _migrations")
            .fetch_one(&db.pool())
            .await
            .unwrap();
        assert_eq!(applied, 1);
    }
}
