use async_trait::async_trait;
use crate::models::{Choice, Connection, Decision, FilterPreferences, NotificationKind, PairKey, Profile};
use crate::services::appwrite::AppwriteError;
use crate::services::cache::CacheError;
use crate::services::postgres::PostgresError;
use thiserror::Error;

/// Errors surfaced by any store adapter
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Postgres(#[from] PostgresError),

    #[error(transparent)]
    Appwrite(#[from] AppwriteError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_)
                | StoreError::Postgres(PostgresError::NotFound(_))
                | StoreError::Appwrite(AppwriteError::NotFound(_))
        )
    }
}

/// Result of a decision upsert
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub decision: Decision,
    /// `true` when the row was inserted, `false` when an existing row was overwritten
    pub inserted: bool,
}

/// Result of a connection insert
#[derive(Debug, Clone)]
pub struct InsertOutcome {
    pub connection: Connection,
    /// `false` when the pair was already connected and the existing row is returned
    pub created: bool,
}

/// Read-only access to profiles and filter preferences
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Profile, StoreError>;

    async fn get_filter_preferences(&self, user_id: &str) -> Result<FilterPreferences, StoreError>;

    /// Eligible candidates for a viewer: never the viewer, never blocked
    /// users, never anyone in `exclude_ids`
    async fn list_candidates(
        &self,
        viewer_id: &str,
        exclude_ids: &[String],
    ) -> Result<Vec<Profile>, StoreError>;
}

/// Durable decision ledger, keyed by the ordered pair (from, to)
#[async_trait]
pub trait DecisionStore: Send + Sync {
    /// Insert or overwrite the decision for (from, to)
    async fn upsert_decision(
        &self,
        from_id: &str,
        to_id: &str,
        choice: Choice,
    ) -> Result<UpsertOutcome, StoreError>;

    async fn get_decision(&self, from_id: &str, to_id: &str) -> Result<Option<Decision>, StoreError>;

    /// Everyone `user_id` has decided on
    async fn decided_ids(&self, user_id: &str) -> Result<Vec<String>, StoreError>;

    /// Everyone who passed on `user_id`
    async fn passed_by_ids(&self, user_id: &str) -> Result<Vec<String>, StoreError>;
}

/// Durable connections with uniqueness on the unordered pair
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Create the connection for `pair`, or return the existing one.
    /// Must be atomic with respect to concurrent inserts of the same pair.
    async fn insert_connection(&self, pair: &PairKey) -> Result<InsertOutcome, StoreError>;

    async fn get_connection(&self, pair: &PairKey) -> Result<Option<Connection>, StoreError>;

    async fn connected_ids(&self, user_id: &str) -> Result<Vec<String>, StoreError>;

    /// Connections of `user_id` other than `connection` created no later than it
    async fn count_prior_connections(
        &self,
        user_id: &str,
        connection: &Connection,
    ) -> Result<u64, StoreError>;

    async fn delete_connection(&self, pair: &PairKey) -> Result<bool, StoreError>;
}

/// Fire-and-forget notification delivery
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<(), StoreError>;
}

/// Chat collaborator that owns message threads
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn open_thread(&self, connection: &Connection) -> Result<(), StoreError>;

    async fn forward_message(
        &self,
        connection: &Connection,
        sender_id: &str,
        body: &str,
    ) -> Result<(), StoreError>;
}
