use async_trait::async_trait;
use crate::models::{Choice, Connection, Decision, PairKey};
use crate::services::store::{ConnectionStore, DecisionStore, InsertOutcome, StoreError, UpsertOutcome};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Connection for {0} vanished during insert")]
    ConnectionRace(String),
}

/// Database representation of a decision choice
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "decision_choice", rename_all = "lowercase")]
pub enum ChoiceColumn {
    Like,
    Pass,
}

impl From<Choice> for ChoiceColumn {
    fn from(value: Choice) -> Self {
        match value {
            Choice::Like => ChoiceColumn::Like,
            Choice::Pass => ChoiceColumn::Pass,
        }
    }
}

impl From<ChoiceColumn> for Choice {
    fn from(value: ChoiceColumn) -> Self {
        match value {
            ChoiceColumn::Like => Choice::Like,
            ChoiceColumn::Pass => Choice::Pass,
        }
    }
}

/// PostgreSQL client backing the decision ledger and the connection store
///
/// The `connections` table carries a unique constraint on
/// `(user_low, user_high)`; that constraint is the only synchronization
/// point between two users liking each other at the same moment.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, PostgresError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }

    async fn fetch_connection(&self, pair: &PairKey) -> Result<Option<Connection>, PostgresError> {
        let query = r#"
            SELECT id, user_low, user_high, created_at
            FROM connections
            WHERE user_low = $1 AND user_high = $2
        "#;

        let row = sqlx::query(query)
            .bind(pair.low())
            .bind(pair.high())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(connection_from_row).transpose()?)
    }

    async fn try_insert_connection(&self, pair: &PairKey) -> Result<Option<Connection>, PostgresError> {
        let query = r#"
            INSERT INTO connections (id, user_low, user_high, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_low, user_high) DO NOTHING
            RETURNING id, user_low, user_high, created_at
        "#;

        let row = sqlx::query(query)
            .bind(uuid::Uuid::new_v4())
            .bind(pair.low())
            .bind(pair.high())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(connection_from_row).transpose()?)
    }
}

fn decision_from_row(row: &PgRow) -> Result<Decision, sqlx::Error> {
    let choice: ChoiceColumn = row.try_get("choice")?;
    Ok(Decision {
        from_id: row.try_get("from_id")?,
        to_id: row.try_get("to_id")?,
        choice: choice.into(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn connection_from_row(row: &PgRow) -> Result<Connection, sqlx::Error> {
    Ok(Connection {
        id: row.try_get("id")?,
        user_low: row.try_get("user_low")?,
        user_high: row.try_get("user_high")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl DecisionStore for PostgresClient {
    /// Uses INSERT ... ON CONFLICT so a repeated decision overwrites the
    /// existing row. `xmax = 0` only holds for freshly inserted rows.
    async fn upsert_decision(
        &self,
        from_id: &str,
        to_id: &str,
        choice: Choice,
    ) -> Result<UpsertOutcome, StoreError> {
        let query = r#"
            INSERT INTO decisions (from_id, to_id, choice, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (from_id, to_id)
            DO UPDATE SET
                choice = EXCLUDED.choice,
                updated_at = EXCLUDED.updated_at
            RETURNING from_id, to_id, choice, created_at, updated_at, (xmax = 0) AS inserted
        "#;

        let row = sqlx::query(query)
            .bind(from_id)
            .bind(to_id)
            .bind(ChoiceColumn::from(choice))
            .fetch_one(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        let inserted: bool = row.try_get("inserted").map_err(PostgresError::from)?;
        let decision = decision_from_row(&row).map_err(PostgresError::from)?;

        tracing::debug!(
            "Recorded decision: {} -> {} ({:?}, inserted: {})",
            from_id,
            to_id,
            choice,
            inserted
        );

        Ok(UpsertOutcome { decision, inserted })
    }

    async fn get_decision(&self, from_id: &str, to_id: &str) -> Result<Option<Decision>, StoreError> {
        let query = r#"
            SELECT from_id, to_id, choice, created_at, updated_at
            FROM decisions
            WHERE from_id = $1 AND to_id = $2
        "#;

        let row = sqlx::query(query)
            .bind(from_id)
            .bind(to_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        Ok(row
            .as_ref()
            .map(decision_from_row)
            .transpose()
            .map_err(PostgresError::from)?)
    }

    async fn decided_ids(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let query = r#"
            SELECT to_id
            FROM decisions
            WHERE from_id = $1
        "#;

        let ids: Vec<String> = sqlx::query_scalar(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        tracing::debug!("User {} has decided on {} profiles", user_id, ids.len());

        Ok(ids)
    }

    async fn passed_by_ids(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let query = r#"
            SELECT from_id
            FROM decisions
            WHERE to_id = $1 AND choice = 'pass'
        "#;

        let ids: Vec<String> = sqlx::query_scalar(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        Ok(ids)
    }
}

#[async_trait]
impl ConnectionStore for PostgresClient {
    async fn insert_connection(&self, pair: &PairKey) -> Result<InsertOutcome, StoreError> {
        // A concurrent unmatch can delete the row between our conflict and
        // our read, so try twice before giving up.
        for _ in 0..2 {
            if let Some(connection) = self.try_insert_connection(pair).await? {
                tracing::info!("Created connection {} for {}", connection.id, pair);
                return Ok(InsertOutcome { connection, created: true });
            }

            if let Some(connection) = self.fetch_connection(pair).await? {
                tracing::debug!("Connection for {} already exists ({})", pair, connection.id);
                return Ok(InsertOutcome { connection, created: false });
            }
        }

        Err(PostgresError::ConnectionRace(pair.to_string()).into())
    }

    async fn get_connection(&self, pair: &PairKey) -> Result<Option<Connection>, StoreError> {
        Ok(self.fetch_connection(pair).await?)
    }

    async fn connected_ids(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let query = r#"
            SELECT CASE WHEN user_low = $1 THEN user_high ELSE user_low END AS other_id
            FROM connections
            WHERE user_low = $1 OR user_high = $1
        "#;

        let ids: Vec<String> = sqlx::query_scalar(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        Ok(ids)
    }

    async fn count_prior_connections(
        &self,
        user_id: &str,
        connection: &Connection,
    ) -> Result<u64, StoreError> {
        let query = r#"
            SELECT COUNT(*)
            FROM connections
            WHERE (user_low = $1 OR user_high = $1)
              AND id <> $2
              AND created_at <= $3
        "#;

        let count: i64 = sqlx::query_scalar(query)
            .bind(user_id)
            .bind(connection.id)
            .bind(connection.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        Ok(count.max(0) as u64)
    }

    async fn delete_connection(&self, pair: &PairKey) -> Result<bool, StoreError> {
        let query = r#"
            DELETE FROM connections
            WHERE user_low = $1 AND user_high = $2
        "#;

        let result = sqlx::query(query)
            .bind(pair.low())
            .bind(pair.high())
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        if result.rows_affected() > 0 {
            tracing::info!("Deleted connection for {}", pair);
        }

        Ok(result.rows_affected() > 0)
    }
}
