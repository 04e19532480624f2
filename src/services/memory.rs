use async_trait::async_trait;
use crate::models::{Choice, Connection, Decision, FilterPreferences, NotificationKind, PairKey, Profile};
use crate::services::store::{
    ChatSink, ConnectionStore, DecisionStore, InsertOutcome, NotificationSink, ProfileStore,
    StoreError, UpsertOutcome,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Notification captured by the in-memory sink
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub user_id: String,
    pub kind: NotificationKind,
    pub payload: serde_json::Value,
}

/// Message forwarded into a chat thread
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardedMessage {
    pub connection_id: uuid::Uuid,
    pub sender_id: String,
    pub body: String,
}

#[derive(Default)]
struct MemoryState {
    profiles: HashMap<String, Profile>,
    preferences: HashMap<String, FilterPreferences>,
    blocks: HashSet<(String, String)>,
    decisions: HashMap<(String, String), Decision>,
    connections: HashMap<PairKey, Connection>,
    notifications: Vec<SentNotification>,
    threads: HashSet<uuid::Uuid>,
    messages: Vec<ForwardedMessage>,
}

/// In-process implementation of every store, for local runs and tests
///
/// All state sits behind one mutex, so a connection insert is a single
/// check-and-set on the pair map and concurrent inserts of the same pair
/// resolve to one row.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_connection_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn put_profile(&self, profile: Profile) {
        self.with_state(|s| {
            s.profiles.insert(profile.user_id.clone(), profile);
        });
    }

    pub fn put_preferences(&self, preferences: FilterPreferences) {
        self.with_state(|s| {
            s.preferences.insert(preferences.user_id.clone(), preferences);
        });
    }

    pub fn block(&self, blocker_id: &str, blocked_id: &str) {
        self.with_state(|s| {
            s.blocks.insert((blocker_id.to_string(), blocked_id.to_string()));
        });
    }

    /// Make connection inserts fail with a transient error, to exercise retries
    pub fn set_fail_connection_inserts(&self, fail: bool) {
        self.fail_connection_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn notifications(&self) -> Vec<SentNotification> {
        self.with_state(|s| s.notifications.clone())
    }

    pub fn forwarded_messages(&self) -> Vec<ForwardedMessage> {
        self.with_state(|s| s.messages.clone())
    }

    pub fn thread_count(&self) -> usize {
        self.with_state(|s| s.threads.len())
    }

    pub fn decision_count(&self) -> usize {
        self.with_state(|s| s.decisions.len())
    }

    pub fn connection_count(&self) -> usize {
        self.with_state(|s| s.connections.len())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, user_id: &str) -> Result<Profile, StoreError> {
        self.state()?
            .profiles
            .get(user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Profile not found for user {}", user_id)))
    }

    async fn get_filter_preferences(&self, user_id: &str) -> Result<FilterPreferences, StoreError> {
        Ok(self
            .state()?
            .preferences
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| FilterPreferences::permissive(user_id)))
    }

    async fn list_candidates(
        &self,
        viewer_id: &str,
        exclude_ids: &[String],
    ) -> Result<Vec<Profile>, StoreError> {
        let state = self.state()?;
        let blocked = |other: &str| {
            state.blocks.contains(&(viewer_id.to_string(), other.to_string()))
                || state.blocks.contains(&(other.to_string(), viewer_id.to_string()))
        };

        let mut candidates: Vec<Profile> = state
            .profiles
            .values()
            .filter(|p| {
                p.user_id != viewer_id
                    && !exclude_ids.contains(&p.user_id)
                    && !blocked(&p.user_id)
            })
            .cloned()
            .collect();

        // HashMap order is arbitrary; keep listings reproducible
        candidates.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(candidates)
    }
}

#[async_trait]
impl DecisionStore for MemoryStore {
    async fn upsert_decision(
        &self,
        from_id: &str,
        to_id: &str,
        choice: Choice,
    ) -> Result<UpsertOutcome, StoreError> {
        let now = chrono::Utc::now();
        let mut state = self.state()?;
        let key = (from_id.to_string(), to_id.to_string());

        let inserted = match state.decisions.get_mut(&key) {
            Some(existing) => {
                existing.choice = choice;
                existing.updated_at = now;
                false
            }
            None => {
                state.decisions.insert(
                    key.clone(),
                    Decision {
                        from_id: from_id.to_string(),
                        to_id: to_id.to_string(),
                        choice,
                        created_at: now,
                        updated_at: now,
                    },
                );
                true
            }
        };

        let decision = state.decisions[&key].clone();
        Ok(UpsertOutcome { decision, inserted })
    }

    async fn get_decision(&self, from_id: &str, to_id: &str) -> Result<Option<Decision>, StoreError> {
        Ok(self
            .state()?
            .decisions
            .get(&(from_id.to_string(), to_id.to_string()))
            .cloned())
    }

    async fn decided_ids(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .state()?
            .decisions
            .values()
            .filter(|d| d.from_id == user_id)
            .map(|d| d.to_id.clone())
            .collect())
    }

    async fn passed_by_ids(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .state()?
            .decisions
            .values()
            .filter(|d| d.to_id == user_id && d.choice == Choice::Pass)
            .map(|d| d.from_id.clone())
            .collect())
    }
}

#[async_trait]
impl ConnectionStore for MemoryStore {
    async fn insert_connection(&self, pair: &PairKey) -> Result<InsertOutcome, StoreError> {
        if self.fail_connection_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection store offline".to_string()));
        }

        let mut state = self.state()?;
        if let Some(existing) = state.connections.get(pair) {
            return Ok(InsertOutcome {
                connection: existing.clone(),
                created: false,
            });
        }

        let connection = Connection {
            id: uuid::Uuid::new_v4(),
            user_low: pair.low().to_string(),
            user_high: pair.high().to_string(),
            created_at: chrono::Utc::now(),
        };
        state.connections.insert(pair.clone(), connection.clone());

        Ok(InsertOutcome {
            connection,
            created: true,
        })
    }

    async fn get_connection(&self, pair: &PairKey) -> Result<Option<Connection>, StoreError> {
        Ok(self.state()?.connections.get(pair).cloned())
    }

    async fn connected_ids(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .state()?
            .connections
            .values()
            .filter_map(|c| c.other(user_id).map(str::to_string))
            .collect())
    }

    async fn count_prior_connections(
        &self,
        user_id: &str,
        connection: &Connection,
    ) -> Result<u64, StoreError> {
        Ok(self
            .state()?
            .connections
            .values()
            .filter(|c| {
                c.involves(user_id) && c.id != connection.id && c.created_at <= connection.created_at
            })
            .count() as u64)
    }

    async fn delete_connection(&self, pair: &PairKey) -> Result<bool, StoreError> {
        Ok(self.state()?.connections.remove(pair).is_some())
    }
}

#[async_trait]
impl NotificationSink for MemoryStore {
    async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.state()?.notifications.push(SentNotification {
            user_id: user_id.to_string(),
            kind,
            payload,
        });
        Ok(())
    }
}

#[async_trait]
impl ChatSink for MemoryStore {
    async fn open_thread(&self, connection: &Connection) -> Result<(), StoreError> {
        self.state()?.threads.insert(connection.id);
        Ok(())
    }

    async fn forward_message(
        &self,
        connection: &Connection,
        sender_id: &str,
        body: &str,
    ) -> Result<(), StoreError> {
        self.state()?.messages.push(ForwardedMessage {
            connection_id: connection.id,
            sender_id: sender_id.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
