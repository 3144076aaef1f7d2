use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Shared SQLite connection pool with the evotrade schema applied.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        let in_memory = db_url.contains(":memory:");

        // Ensure the directory exists if it's a file path
        if !in_memory && let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let mut options = SqliteConnectOptions::from_str(db_url)
            .with_context(|| format!("Invalid database URL: {}", db_url))?
            .create_if_missing(true);

        // An in-memory database lives and dies with its single connection.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            options = options.journal_mode(SqliteJournalMode::Wal);
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Database: Connected to {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                dna_json TEXT NOT NULL,
                status TEXT NOT NULL,
                generation_index INTEGER NOT NULL,
                parent_ids_json TEXT NOT NULL,
                metrics_json TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                last_heartbeat_at INTEGER,
                eliminated_at INTEGER
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create agents table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_agents_status_generation
            ON agents (status, generation_index);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create agents index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS generations (
                id TEXT PRIMARY KEY,
                generation_index INTEGER NOT NULL UNIQUE,
                status TEXT NOT NULL,
                config_json TEXT NOT NULL,
                stats_json TEXT,
                created_at INTEGER NOT NULL,
                completed_at INTEGER
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create generations table")?;

        // At most one active generation.
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_generations_single_active
            ON generations (status) WHERE status = 'active';
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create active generation index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS execution_records (
                id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                action TEXT NOT NULL,
                quantity TEXT NOT NULL,
                price TEXT NOT NULL,
                fees TEXT NOT NULL,
                realized_pnl TEXT NOT NULL,
                status TEXT NOT NULL,
                confidence REAL NOT NULL,
                rationale TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_execution_records_agent_time
            ON execution_records (agent_id, timestamp);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create execution_records table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metric_snapshots (
                id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                generation_index INTEGER NOT NULL,
                metrics_json TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_metric_snapshots_agent_time
            ON metric_snapshots (agent_id, timestamp);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create metric_snapshots table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS system_events (
                id TEXT PRIMARY KEY,
                level TEXT NOT NULL,
                source TEXT NOT NULL,
                message TEXT NOT NULL,
                agent_id TEXT,
                timestamp INTEGER NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create system_events table")?;

        info!("Database: Schema initialized");
        Ok(())
    }
}
