//! PostgreSQL-backed store

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

use super::{PositionStore, ProcessedLedger, StoreResult};
use crate::config::DatabaseConfig;
use crate::error::{IngestError, Result, StoreError};
use crate::models::{PositionRecord, VesselId};

/// Ledger and position sink sharing one connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open the pool and verify the server answers
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .connect(&config.url)
            .await
            .map_err(|e| IngestError::Connection(e.to_string()))?;

        let store = Self::new(pool);
        store.health_check().await?;

        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Database connection pool created"
        );

        Ok(store)
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| IngestError::Store(format!("failed to run migrations: {e}")))?;
        info!("Database migrations completed");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| IngestError::Connection(e.to_string()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ProcessedLedger for PgStore {
    async fn list_processed_files(&self) -> StoreResult<HashSet<String>> {
        let files: Vec<String> = sqlx::query_scalar("SELECT json_file FROM processed_file")
            .fetch_all(&self.pool)
            .await?;

        debug!(count = files.len(), "Loaded processed file ledger");
        Ok(files.into_iter().collect())
    }

    async fn mark_file_processed(&self, path: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO processed_file (json_file)
            VALUES ($1)
            ON CONFLICT (json_file) DO NOTHING
            "#,
        )
        .bind(path)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_vessel_todo(&self, vessel_id: &VesselId) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ship_id_todo_list (ship_id)
            VALUES ($1)
            ON CONFLICT (ship_id) DO NOTHING
            "#,
        )
        .bind(vessel_id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl PositionStore for PgStore {
    async fn insert_position(&self, record: &PositionRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ship_position (
                id, ship_id, shipname, destination, heading, datetime,
                longitude, latitude, length, rot, speed, shiptype, width, source_file
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.vessel_id.as_str())
        .bind(&record.name)
        .bind(&record.destination)
        .bind(&record.heading)
        .bind(record.timestamp)
        .bind(record.position.longitude)
        .bind(record.position.latitude)
        .bind(&record.length)
        .bind(&record.rotation)
        .bind(&record.speed)
        .bind(&record.vessel_type)
        .bind(&record.width)
        .bind(&record.source_file)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(())
    }
}
