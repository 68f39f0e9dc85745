//! PostgreSQL store backend.
//!
//! Sequence numbers come from a database sequence applied inside the
//! INSERT, so assignment and persistence are a single atomic statement
//! and `range` reads observe every committed append.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::notification::Notification;

use super::backend::{Store, StoreError};

/// PostgreSQL-backed notification log.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect a pool using the store configuration.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .connect(&config.url)
            .await?;

        tracing::info!(pool_size = config.pool_size, "PostgreSQL store pool created");

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the sequence and table if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query("CREATE SEQUENCE IF NOT EXISTS notification_seq")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id UUID PRIMARY KEY,
                seq BIGINT NOT NULL UNIQUE DEFAULT nextval('notification_seq'),
                type TEXT NOT NULL,
                payload JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS notifications_seq_idx ON notifications (seq)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

type NotificationRow = (Uuid, i64, String, serde_json::Value, DateTime<Utc>);

fn from_row(row: NotificationRow) -> Notification {
    let (id, seq, kind, payload, created_at) = row;
    Notification {
        id,
        seq,
        kind,
        payload,
        created_at,
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn append(
        &self,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<Notification, StoreError> {
        let row: NotificationRow = sqlx::query_as(
            r#"
            INSERT INTO notifications (id, type, payload)
            VALUES ($1, $2, $3)
            RETURNING id, seq, type, payload, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(kind)
        .bind(&payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(from_row(row))
    }

    async fn range(&self, after_seq: i64, limit: usize) -> Result<Vec<Notification>, StoreError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT id, seq, type, payload, created_at
            FROM notifications
            WHERE seq > $1
            ORDER BY seq ASC
            LIMIT $2
            "#,
        )
        .bind(after_seq)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(from_row).collect())
    }
}
