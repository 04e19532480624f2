use crate::core::{CandidateQueue, Matcher, SessionSwipeCache};
use crate::models::{Choice, Connection, MatchEvent, NotificationKind, PairKey, Strategy};
use crate::services::events::MatchEventBus;
use crate::services::ledger::{validate_pair, DecisionLedger, LedgerError};
use crate::services::memory::MemoryStore;
use crate::services::mutual::{Detection, MutualMatchDetector, PairState};
use crate::services::store::{
    ChatSink, ConnectionStore, DecisionStore, NotificationSink, ProfileStore, StoreError,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::broadcast;
use validator::Validate;

/// Errors returned by the matching engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store temporarily unavailable: {0}")]
    TransientStore(#[source] StoreError),

    #[error("Queue refresh for {0} was superseded by a newer one")]
    Superseded(String),
}

impl EngineError {
    /// Whether the caller should simply retry the same call
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::TransientStore(_))
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        if err.is_not_found() {
            EngineError::NotFound(err.to_string())
        } else {
            EngineError::TransientStore(err)
        }
    }
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Invalid(msg) => EngineError::Validation(msg),
            LedgerError::Store(e) => e.into(),
        }
    }
}

/// Parse a strategy name, treating unknown names as a validation error
pub fn parse_strategy(name: &str) -> Result<Strategy, EngineError> {
    name.parse().map_err(EngineError::Validation)
}

/// Parse a decision choice, treating unknown values as a validation error
pub fn parse_choice(value: &str) -> Result<Choice, EngineError> {
    value.parse().map_err(EngineError::Validation)
}

/// Result of a single like/pass
#[derive(Debug, Clone, PartialEq)]
pub struct DecideOutcome {
    pub mutual: bool,
    pub is_first_match: bool,
    pub connection_id: Option<uuid::Uuid>,
    pub was_new_decision: bool,
    /// The pair was already connected; nothing was written
    pub stale: bool,
}

/// Summary of one pass over the pending re-check queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecheckReport {
    pub checked: usize,
    pub created: usize,
    pub requeued: usize,
}

/// Collaborators the engine reads from and writes to
#[derive(Clone)]
pub struct EngineStores {
    pub profiles: Arc<dyn ProfileStore>,
    pub decisions: Arc<dyn DecisionStore>,
    pub connections: Arc<dyn ConnectionStore>,
    pub notifier: Arc<dyn NotificationSink>,
    pub chat: Arc<dyn ChatSink>,
}

impl EngineStores {
    /// Every collaborator served by one in-memory store
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            profiles: store.clone(),
            decisions: store.clone(),
            connections: store.clone(),
            notifier: store.clone(),
            chat: store,
        }
    }
}

/// Generation tickets for queue refreshes, one counter per viewer
#[derive(Default)]
struct RefreshTracker {
    generations: Mutex<HashMap<String, u64>>,
}

impl RefreshTracker {
    fn begin(&self, viewer_id: &str) -> u64 {
        let mut generations = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        let generation = generations.entry(viewer_id.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn is_current(&self, viewer_id: &str, ticket: u64) -> bool {
        let generations = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        generations.get(viewer_id).copied() == Some(ticket)
    }
}

/// Pairs whose mutual check failed after the decision was stored
#[derive(Default)]
struct PendingRechecks {
    queue: Mutex<VecDeque<PairKey>>,
}

impl PendingRechecks {
    fn push(&self, pair: PairKey) {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if !queue.contains(&pair) {
            queue.push_back(pair);
        }
    }

    fn drain(&self) -> Vec<PairKey> {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.drain(..).collect()
    }

    fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Facade tying candidate ranking, the decision ledger and mutual-match
/// detection together
pub struct MatchEngine {
    profiles: Arc<dyn ProfileStore>,
    decisions: Arc<dyn DecisionStore>,
    connections: Arc<dyn ConnectionStore>,
    notifier: Arc<dyn NotificationSink>,
    chat: Arc<dyn ChatSink>,
    matcher: Matcher,
    ledger: DecisionLedger,
    detector: MutualMatchDetector,
    events: MatchEventBus,
    refreshes: RefreshTracker,
    rechecks: PendingRechecks,
}

impl MatchEngine {
    pub fn new(stores: EngineStores, matcher: Matcher) -> Self {
        Self::with_event_bus(stores, matcher, MatchEventBus::default())
    }

    pub fn with_event_bus(stores: EngineStores, matcher: Matcher, events: MatchEventBus) -> Self {
        Self {
            ledger: DecisionLedger::new(stores.decisions.clone()),
            detector: MutualMatchDetector::new(stores.decisions.clone(), stores.connections.clone()),
            profiles: stores.profiles,
            decisions: stores.decisions,
            connections: stores.connections,
            notifier: stores.notifier,
            chat: stores.chat,
            matcher,
            events,
            refreshes: RefreshTracker::default(),
            rechecks: PendingRechecks::default(),
        }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Realtime stream of decisions and connection changes
    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.events.subscribe()
    }

    /// Build the ranked candidate queue for a viewer
    ///
    /// Excludes everyone the viewer decided on, everyone who passed on the
    /// viewer, existing connections and ids hidden in `session`. Ids the
    /// ledger already reflects are dropped from `session`. A newer refresh
    /// for the same viewer started meanwhile turns this one into
    /// [`EngineError::Superseded`].
    pub async fn get_candidate_queue(
        &self,
        viewer_id: &str,
        strategy: Strategy,
        session: &mut SessionSwipeCache,
    ) -> Result<CandidateQueue, EngineError> {
        if viewer_id.trim().is_empty() {
            return Err(EngineError::Validation("viewer id must not be empty".to_string()));
        }

        let ticket = self.refreshes.begin(viewer_id);

        let (viewer, preferences) = tokio::try_join!(
            self.profiles.get_profile(viewer_id),
            self.profiles.get_filter_preferences(viewer_id),
        )?;

        preferences
            .validate()
            .map_err(|e| EngineError::Validation(format!("invalid filter preferences: {}", e)))?;

        let (decided, passed_by, connected) = tokio::try_join!(
            self.decisions.decided_ids(viewer_id),
            self.decisions.passed_by_ids(viewer_id),
            self.connections.connected_ids(viewer_id),
        )?;

        let confirmed = session.confirm(decided.iter());
        if confirmed > 0 {
            tracing::debug!("{} session swipes confirmed for {}", confirmed, viewer_id);
        }

        let excluded: HashSet<String> = decided
            .into_iter()
            .chain(passed_by)
            .chain(connected)
            .collect();
        let exclude_ids: Vec<String> = excluded.iter().cloned().collect();

        let candidates = self.profiles.list_candidates(viewer_id, &exclude_ids).await?;
        let queue = self.matcher.build_queue(
            &viewer,
            &preferences,
            candidates,
            &excluded,
            session,
            strategy,
        );

        if !self.refreshes.is_current(viewer_id, ticket) {
            tracing::debug!("Discarding superseded queue refresh for {}", viewer_id);
            return Err(EngineError::Superseded(viewer_id.to_string()));
        }

        tracing::info!(
            "Built queue for {}: {} ranked of {} listed ({})",
            viewer_id,
            queue.len(),
            queue.total_candidates(),
            strategy
        );

        Ok(queue)
    }

    /// Record a like or pass and run the mutual check
    ///
    /// Deciding on someone already connected is a no-op reported as
    /// `stale`. Repeating a decision overwrites it, so a failed call can be
    /// retried as-is.
    pub async fn decide(
        &self,
        viewer_id: &str,
        candidate_id: &str,
        choice: Choice,
        opening_message: Option<&str>,
    ) -> Result<DecideOutcome, EngineError> {
        validate_pair(viewer_id, candidate_id)?;
        let pair = pair_key(viewer_id, candidate_id)?;

        if let Some(existing) = self.connections.get_connection(&pair).await? {
            tracing::debug!("{} decided on already connected {}", viewer_id, candidate_id);
            return Ok(DecideOutcome {
                mutual: true,
                is_first_match: false,
                connection_id: Some(existing.id),
                was_new_decision: false,
                stale: true,
            });
        }

        let recorded = self.ledger.record_decision(viewer_id, candidate_id, choice).await?;
        self.events.publish(MatchEvent::DecisionRecorded {
            from: viewer_id.to_string(),
            to: candidate_id.to_string(),
            choice,
        });

        let detection = match self
            .detector
            .on_decision_recorded(viewer_id, candidate_id, choice)
            .await
        {
            Ok(detection) => detection,
            Err(e) => {
                tracing::error!("Mutual check failed for {}, queued for re-check: {}", pair, e);
                self.rechecks.push(pair);
                return Err(EngineError::TransientStore(e));
            }
        };

        let connection = match detection.connection {
            Some(connection) if detection.mutual => connection,
            _ => {
                return Ok(DecideOutcome {
                    mutual: false,
                    is_first_match: false,
                    connection_id: None,
                    was_new_decision: recorded.was_new_decision,
                    stale: false,
                })
            }
        };

        if detection.created {
            self.announce_connection(&connection, &[candidate_id]).await;
        }

        if let Some(body) = opening_message.map(str::trim).filter(|b| !b.is_empty()) {
            if let Err(e) = self.chat.forward_message(&connection, viewer_id, body).await {
                tracing::warn!("Failed to forward opening message for {}: {}", connection.id, e);
            }
        }

        let is_first_match = match self
            .connections
            .count_prior_connections(viewer_id, &connection)
            .await
        {
            Ok(prior) => prior == 0,
            Err(e) => {
                tracing::warn!("Could not count prior connections for {}: {}", viewer_id, e);
                false
            }
        };

        Ok(DecideOutcome {
            mutual: true,
            is_first_match,
            connection_id: Some(connection.id),
            was_new_decision: recorded.was_new_decision,
            stale: false,
        })
    }

    /// Dissolve a connection
    ///
    /// A pair with no connection is left untouched and `false` is returned.
    /// Otherwise both directions are recorded as `pass` before the row is
    /// deleted, so the ledger never holds mutual likes without a connection.
    pub async fn unmatch(&self, user_id: &str, other_id: &str) -> Result<bool, EngineError> {
        validate_pair(user_id, other_id)?;
        let pair = pair_key(user_id, other_id)?;

        if self.connections.get_connection(&pair).await?.is_none() {
            tracing::debug!("{} has no connection with {}, nothing to unmatch", user_id, other_id);
            return Ok(false);
        }

        self.ledger.record_decision(user_id, other_id, Choice::Pass).await?;
        self.ledger.record_decision(other_id, user_id, Choice::Pass).await?;

        let removed = self.connections.delete_connection(&pair).await?;
        if removed {
            tracing::info!("{} unmatched {}", user_id, other_id);
            self.events.publish(MatchEvent::ConnectionRemoved { users: pair });
        }

        Ok(removed)
    }

    pub async fn connected_ids(&self, user_id: &str) -> Result<Vec<String>, EngineError> {
        if user_id.trim().is_empty() {
            return Err(EngineError::Validation("user id must not be empty".to_string()));
        }
        let mut ids = self.connections.connected_ids(user_id).await?;
        ids.sort();
        Ok(ids)
    }

    pub async fn pair_state(&self, a: &str, b: &str) -> Result<PairState, EngineError> {
        validate_pair(a, b)?;
        Ok(self.detector.pair_state(&pair_key(a, b)?).await?)
    }

    /// Re-derive the connection for a pair from the ledger, announcing it
    /// to both users when it had to be created
    pub async fn reconcile_pair(&self, a: &str, b: &str) -> Result<Detection, EngineError> {
        validate_pair(a, b)?;
        let pair = pair_key(a, b)?;
        Ok(self.reconcile(&pair).await?)
    }

    pub fn pending_rechecks(&self) -> usize {
        self.rechecks.len()
    }

    /// Drain the re-check queue; pairs that fail again are queued again
    pub async fn retry_pending_rechecks(&self) -> RecheckReport {
        let mut report = RecheckReport::default();

        for pair in self.rechecks.drain() {
            report.checked += 1;
            match self.reconcile(&pair).await {
                Ok(detection) if detection.created => report.created += 1,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Re-check for {} failed again: {}", pair, e);
                    self.rechecks.push(pair);
                    report.requeued += 1;
                }
            }
        }

        if report.checked > 0 {
            tracing::info!(
                "Re-checked {} pairs: {} connections created, {} requeued",
                report.checked,
                report.created,
                report.requeued
            );
        }

        report
    }

    async fn reconcile(&self, pair: &PairKey) -> Result<Detection, StoreError> {
        let detection = self.detector.reconcile_pair(pair).await?;
        if detection.created {
            if let Some(connection) = &detection.connection {
                // Neither side saw the match when deciding
                self.announce_connection(connection, &[pair.low(), pair.high()])
                    .await;
            }
        }
        Ok(detection)
    }

    /// Side effects owned by whoever created the connection row
    async fn announce_connection(&self, connection: &Connection, recipients: &[&str]) {
        for user_id in recipients {
            let payload = serde_json::json!({
                "connectionId": connection.id,
                "matchedUserId": connection.other(user_id),
            });
            if let Err(e) = self
                .notifier
                .notify(user_id, NotificationKind::NewMatch, payload)
                .await
            {
                tracing::warn!("Failed to notify {} about {}: {}", user_id, connection.id, e);
            }
        }

        if let Err(e) = self.chat.open_thread(connection).await {
            tracing::warn!("Failed to open chat thread for {}: {}", connection.id, e);
        }

        self.events.publish(MatchEvent::ConnectionCreated {
            connection_id: connection.id,
            users: connection.pair(),
        });
    }
}

fn pair_key(a: &str, b: &str) -> Result<PairKey, EngineError> {
    PairKey::new(a, b).ok_or_else(|| EngineError::Validation(format!("invalid pair {} / {}", a, b)))
}
