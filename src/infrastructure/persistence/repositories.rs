//! SQLite implementation of [`AgentStore`].
//!
//! DNA, metrics, generation config and stats are stored as JSON documents;
//! decimals as TEXT; timestamps as epoch milliseconds. Agents are listed in
//! insertion order (rowid).

use crate::domain::agent::{Agent, AgentFilter, AgentId, AgentPatch, AgentStatus};
use crate::domain::errors::StoreError;
use crate::domain::events::{SystemEvent, SystemEventLevel};
use crate::domain::execution::{ExecutionRecord, ExecutionStatus, MetricSnapshot, TradeAction};
use crate::domain::generation::{
    Generation, GenerationPatch, GenerationStats, GenerationStatus,
};
use crate::domain::repositories::AgentStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::{debug, warn};
use uuid::Uuid;

/// Optimistic retries for an agent update racing a status change.
const UPDATE_RETRIES: usize = 3;

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .with_context(|| format!("Timestamp out of range: {}", millis))
}

fn optional_from_millis(millis: Option<i64>) -> Result<Option<DateTime<Utc>>> {
    millis.map(from_millis).transpose()
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("Invalid UUID in database: {}", raw))
}

fn parse_decimal(row: &SqliteRow, column: &str) -> Result<Decimal> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).with_context(|| format!("Invalid decimal in {}: {}", column, raw))
}

pub struct SqliteAgentStore {
    pool: SqlitePool,
}

impl SqliteAgentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_agent(row: &SqliteRow) -> Result<Agent> {
        let id: String = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        let dna_json: String = row.try_get("dna_json")?;
        let parents_json: String = row.try_get("parent_ids_json")?;
        let metrics_json: String = row.try_get("metrics_json")?;
        let generation_index: i64 = row.try_get("generation_index")?;

        Ok(Agent {
            id: parse_uuid(&id)?,
            name: row.try_get("name")?,
            dna: serde_json::from_str(&dna_json).context("Failed to decode agent DNA")?,
            status: AgentStatus::from_str(&status)?,
            generation_index: generation_index as u32,
            parent_ids: serde_json::from_str(&parents_json)
                .context("Failed to decode agent parents")?,
            metrics: serde_json::from_str(&metrics_json)
                .context("Failed to decode agent metrics")?,
            created_at: from_millis(row.try_get("created_at")?)?,
            last_heartbeat_at: optional_from_millis(row.try_get("last_heartbeat_at")?)?,
            eliminated_at: optional_from_millis(row.try_get("eliminated_at")?)?,
        })
    }

    fn map_generation(row: &SqliteRow) -> Result<Generation> {
        let id: String = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        let config_json: String = row.try_get("config_json")?;
        let stats_json: Option<String> = row.try_get("stats_json")?;
        let index: i64 = row.try_get("generation_index")?;

        Ok(Generation {
            id: parse_uuid(&id)?,
            index: index as u32,
            status: GenerationStatus::from_str(&status)?,
            config: serde_json::from_str(&config_json)
                .context("Failed to decode generation config")?,
            stats: stats_json
                .map(|json| serde_json::from_str::<GenerationStats>(&json))
                .transpose()
                .context("Failed to decode generation stats")?,
            created_at: from_millis(row.try_get("created_at")?)?,
            completed_at: optional_from_millis(row.try_get("completed_at")?)?,
        })
    }

    fn map_execution_record(row: &SqliteRow) -> Result<ExecutionRecord> {
        let id: String = row.try_get("id")?;
        let agent_id: String = row.try_get("agent_id")?;
        let action: String = row.try_get("action")?;
        let status: String = row.try_get("status")?;

        Ok(ExecutionRecord {
            id: parse_uuid(&id)?,
            agent_id: parse_uuid(&agent_id)?,
            action: TradeAction::from_str(&action)?,
            quantity: parse_decimal(row, "quantity")?,
            price: parse_decimal(row, "price")?,
            fees: parse_decimal(row, "fees")?,
            realized_pnl: parse_decimal(row, "realized_pnl")?,
            status: ExecutionStatus::from_str(&status)?,
            confidence: row.try_get("confidence")?,
            rationale: row.try_get("rationale")?,
            timestamp: from_millis(row.try_get("timestamp")?)?,
        })
    }

    fn map_metric_snapshot(row: &SqliteRow) -> Result<MetricSnapshot> {
        let id: String = row.try_get("id")?;
        let agent_id: String = row.try_get("agent_id")?;
        let metrics_json: String = row.try_get("metrics_json")?;
        let generation_index: i64 = row.try_get("generation_index")?;

        Ok(MetricSnapshot {
            id: parse_uuid(&id)?,
            agent_id: parse_uuid(&agent_id)?,
            generation_index: generation_index as u32,
            metrics: serde_json::from_str(&metrics_json)
                .context("Failed to decode snapshot metrics")?,
            timestamp: from_millis(row.try_get("timestamp")?)?,
        })
    }

    fn map_system_event(row: &SqliteRow) -> Result<SystemEvent> {
        let id: String = row.try_get("id")?;
        let level: String = row.try_get("level")?;
        let agent_id: Option<String> = row.try_get("agent_id")?;

        Ok(SystemEvent {
            id: parse_uuid(&id)?,
            level: SystemEventLevel::from_str(&level)?,
            source: row.try_get("source")?,
            message: row.try_get("message")?,
            agent_id: agent_id.as_deref().map(parse_uuid).transpose()?,
            timestamp: from_millis(row.try_get("timestamp")?)?,
        })
    }

    async fn find_generation(&self, id: Uuid) -> Result<Generation> {
        let row = sqlx::query("SELECT * FROM generations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load generation")?
            .ok_or(StoreError::GenerationNotFound(id))?;
        Self::map_generation(&row)
    }
}

#[async_trait]
impl AgentStore for SqliteAgentStore {
    async fn list_agents(&self, filter: &AgentFilter) -> Result<Vec<Agent>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM agents WHERE 1=1");
        if !filter.statuses.is_empty() {
            qb.push(" AND status IN (");
            let mut statuses = qb.separated(", ");
            for status in &filter.statuses {
                statuses.push_bind(status.to_string());
            }
            statuses.push_unseparated(")");
        }
        if let Some(index) = filter.generation_index {
            qb.push(" AND generation_index = ");
            qb.push_bind(index as i64);
        }
        qb.push(" ORDER BY rowid ASC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list agents")?;
        rows.iter().map(Self::map_agent).collect()
    }

    async fn get_agent(&self, id: AgentId) -> Result<Option<Agent>> {
        let row = sqlx::query("SELECT * FROM agents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load agent")?;
        row.as_ref().map(Self::map_agent).transpose()
    }

    async fn update_agent(&self, id: AgentId, patch: &AgentPatch) -> Result<Agent> {
        for attempt in 1..=UPDATE_RETRIES {
            let mut agent = self
                .get_agent(id)
                .await?
                .ok_or(StoreError::AgentNotFound(id))?;
            let observed_status = agent.status;
            patch.validate_for(&agent)?;
            patch.apply(&mut agent);

            // Guarded on the observed status so a concurrent elimination
            // cannot be overwritten.
            let result = sqlx::query(
                r#"
                UPDATE agents
                SET status = ?, generation_index = ?, metrics_json = ?,
                    last_heartbeat_at = ?, eliminated_at = ?
                WHERE id = ? AND status = ?
                "#,
            )
            .bind(agent.status.to_string())
            .bind(agent.generation_index as i64)
            .bind(serde_json::to_string(&agent.metrics)?)
            .bind(agent.last_heartbeat_at.map(to_millis))
            .bind(agent.eliminated_at.map(to_millis))
            .bind(id.to_string())
            .bind(observed_status.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update agent")?;

            if result.rows_affected() == 1 {
                return Ok(agent);
            }
            debug!(
                "SqliteAgentStore: Status of agent {} changed during update (attempt {})",
                id, attempt
            );
        }

        warn!(
            "SqliteAgentStore: Giving up on agent {} after {} contended updates",
            id, UPDATE_RETRIES
        );
        anyhow::bail!("Agent {} kept changing status during update", id)
    }

    async fn insert_agents(&self, agents: Vec<Agent>) -> Result<Vec<Agent>> {
        let mut tx = self.pool.begin().await?;
        for agent in &agents {
            sqlx::query(
                r#"
                INSERT INTO agents (id, name, dna_json, status, generation_index,
                    parent_ids_json, metrics_json, created_at, last_heartbeat_at, eliminated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(agent.id.to_string())
            .bind(&agent.name)
            .bind(serde_json::to_string(&agent.dna)?)
            .bind(agent.status.to_string())
            .bind(agent.generation_index as i64)
            .bind(serde_json::to_string(&agent.parent_ids)?)
            .bind(serde_json::to_string(&agent.metrics)?)
            .bind(to_millis(agent.created_at))
            .bind(agent.last_heartbeat_at.map(to_millis))
            .bind(agent.eliminated_at.map(to_millis))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert agent {}", agent.id))?;
        }
        tx.commit().await?;
        Ok(agents)
    }

    async fn insert_execution_record(&self, record: &ExecutionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO execution_records (id, agent_id, action, quantity, price, fees,
                realized_pnl, status, confidence, rationale, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.agent_id.to_string())
        .bind(record.action.to_string())
        .bind(record.quantity.to_string())
        .bind(record.price.to_string())
        .bind(record.fees.to_string())
        .bind(record.realized_pnl.to_string())
        .bind(record.status.to_string())
        .bind(record.confidence)
        .bind(&record.rationale)
        .bind(to_millis(record.timestamp))
        .execute(&self.pool)
        .await
        .context("Failed to save execution record")?;
        Ok(())
    }

    async fn insert_metric_snapshot(&self, snapshot: &MetricSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO metric_snapshots (id, agent_id, generation_index, metrics_json, timestamp)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(snapshot.id.to_string())
        .bind(snapshot.agent_id.to_string())
        .bind(snapshot.generation_index as i64)
        .bind(serde_json::to_string(&snapshot.metrics)?)
        .bind(to_millis(snapshot.timestamp))
        .execute(&self.pool)
        .await
        .context("Failed to save metric snapshot")?;
        Ok(())
    }

    async fn get_active_generation(&self) -> Result<Option<Generation>> {
        let row = sqlx::query("SELECT * FROM generations WHERE status = ? LIMIT 1")
            .bind(GenerationStatus::Active.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load active generation")?;
        row.as_ref().map(Self::map_generation).transpose()
    }

    async fn insert_generation(&self, generation: &Generation) -> Result<()> {
        if generation.status == GenerationStatus::Active
            && let Some(active) = self.get_active_generation().await?
        {
            return Err(StoreError::ActiveGenerationExists(active.index).into());
        }

        sqlx::query(
            r#"
            INSERT INTO generations (id, generation_index, status, config_json, stats_json,
                created_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(generation.id.to_string())
        .bind(generation.index as i64)
        .bind(generation.status.to_string())
        .bind(serde_json::to_string(&generation.config)?)
        .bind(generation.stats.as_ref().map(serde_json::to_string).transpose()?)
        .bind(to_millis(generation.created_at))
        .bind(generation.completed_at.map(to_millis))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert generation {}", generation.index))?;
        Ok(())
    }

    async fn update_generation(&self, id: Uuid, patch: &GenerationPatch) -> Result<Generation> {
        let mut generation = self.find_generation(id).await?;
        patch.apply(&mut generation);

        sqlx::query(
            "UPDATE generations SET status = ?, stats_json = ?, completed_at = ? WHERE id = ?",
        )
        .bind(generation.status.to_string())
        .bind(generation.stats.as_ref().map(serde_json::to_string).transpose()?)
        .bind(generation.completed_at.map(to_millis))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update generation")?;
        Ok(generation)
    }

    async fn insert_system_event(&self, event: &SystemEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO system_events (id, level, source, message, agent_id, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.level.to_string())
        .bind(&event.source)
        .bind(&event.message)
        .bind(event.agent_id.map(|id| id.to_string()))
        .bind(to_millis(event.timestamp))
        .execute(&self.pool)
        .await
        .context("Failed to save system event")?;
        Ok(())
    }

    /// Completes `old_id` and inserts `next` in one transaction.
    async fn rotate_generation(
        &self,
        old_id: Uuid,
        stats: GenerationStats,
        next: &Generation,
    ) -> Result<Generation> {
        let completed_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE generations SET status = ?, stats_json = ?, completed_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(GenerationStatus::Completed.to_string())
        .bind(serde_json::to_string(&stats)?)
        .bind(to_millis(completed_at))
        .bind(old_id.to_string())
        .bind(GenerationStatus::Active.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to complete generation")?;

        if result.rows_affected() == 0 {
            return Err(StoreError::GenerationNotFound(old_id).into());
        }

        sqlx::query(
            r#"
            INSERT INTO generations (id, generation_index, status, config_json, stats_json,
                created_at, completed_at)
            VALUES (?, ?, ?, ?, NULL, ?, NULL)
            "#,
        )
        .bind(next.id.to_string())
        .bind(next.index as i64)
        .bind(next.status.to_string())
        .bind(serde_json::to_string(&next.config)?)
        .bind(to_millis(next.created_at))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert generation {}", next.index))?;

        tx.commit().await.context("Failed to commit generation rotation")?;
        self.find_generation(old_id).await
    }

    async fn list_generations(&self) -> Result<Vec<Generation>> {
        let rows = sqlx::query("SELECT * FROM generations ORDER BY generation_index ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::map_generation).collect()
    }

    async fn list_execution_records(&self, agent_id: AgentId) -> Result<Vec<ExecutionRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM execution_records WHERE agent_id = ? ORDER BY timestamp ASC, rowid ASC",
        )
        .bind(agent_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::map_execution_record).collect()
    }

    async fn list_metric_snapshots(&self, agent_id: AgentId) -> Result<Vec<MetricSnapshot>> {
        let rows = sqlx::query(
            "SELECT * FROM metric_snapshots WHERE agent_id = ? ORDER BY timestamp ASC, rowid ASC",
        )
        .bind(agent_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::map_metric_snapshot).collect()
    }

    async fn list_system_events(&self) -> Result<Vec<SystemEvent>> {
        let rows = sqlx::query("SELECT * FROM system_events ORDER BY timestamp ASC, rowid ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::map_system_event).collect()
    }
}
