//! SQLite-backed panel store.
//!
//! Split into focused submodules:
//! - `users`: panel accounts and credentials
//! - `instances`: WhatsApp instances and their provider references
//! - `groups`: groups discovered per instance
//! - `contacts`: the address book used for bulk sends

mod contacts;
mod groups;
mod instances;
mod users;


pub use contacts::{Contact, ContactFilter, ContactInput};
pub use groups::Group;
pub use instances::Instance;
pub use users::User;

use evopanel_core::{config::StoreConfig, error::PanelError, shellexpand};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Persistent panel store backed by SQLite.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the database file and run pending migrations.
    pub async fn new(config: &StoreConfig) -> Result<Self, PanelError> {
        let db_path = shellexpand(&config.db_path);

        if let Some(parent) = std::path::Path::new(&db_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PanelError::Store(format!("failed to create data dir: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| PanelError::Store(format!("invalid db path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| PanelError::Store(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;

        info!("panel store initialized at {db_path}");

        Ok(Self { pool })
    }

    /// A private in-memory database on a single pinned connection.
    ///
    /// The data lives as long as the pool does.
    pub async fn in_memory() -> Result<Self, PanelError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| PanelError::Store(format!("invalid db path: {e}")))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .map_err(|e| PanelError::Store(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Current database time, as a round-trip health probe.
    pub async fn db_time(&self) -> Result<String, PanelError> {
        let (now,): (String,) = sqlx::query_as("SELECT datetime('now')")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PanelError::Store(format!("health query failed: {e}")))?;
        Ok(now)
    }

    /// Get the database file size in bytes.
    pub async fn db_size(&self) -> Result<u64, PanelError> {
        let (page_count,): (i64,) = sqlx::query_as("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PanelError::Store(format!("pragma failed: {e}")))?;

        let (page_size,): (i64,) = sqlx::query_as("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PanelError::Store(format!("pragma failed: {e}")))?;

        Ok((page_count * page_size) as u64)
    }

    /// Run SQL migrations, tracking which have already been applied.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), PanelError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| PanelError::Store(format!("failed to create migrations table: {e}")))?;

        let migrations: &[(&str, &str)] = &[
            ("001_init", include_str!("../../migrations/001_init.sql")),
            (
                "002_instances",
                include_str!("../../migrations/002_instances.sql"),
            ),
            (
                "003_contacts",
                include_str!("../../migrations/003_contacts.sql"),
            ),
        ];

        for (name, sql) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        PanelError::Store(format!("failed to check migration {name}: {e}"))
                    })?;

            if applied.is_some() {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map_err(|e| PanelError::Store(format!("migration {name} failed: {e}")))?;

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| {
                    PanelError::Store(format!("failed to record migration {name}: {e}"))
                })?;

            info!("applied migration {name}");
        }
        Ok(())
    }
}

/// Map a write failure, turning unique-constraint violations into `Conflict`.
pub(crate) fn write_error(e: sqlx::Error, what: &str, conflict: &str) -> PanelError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PanelError::Conflict(conflict.to_string())
        }
        _ => PanelError::Store(format!("{what} failed: {e}")),
    }
}
