use crate::models::{Choice, Connection, PairKey};
use crate::services::store::{ConnectionStore, DecisionStore, StoreError};
use std::sync::Arc;

/// Outcome of the mutual check that follows a ledger write
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub mutual: bool,
    pub connection: Option<Connection>,
    /// `true` only for the call whose insert created the connection row
    pub created: bool,
}

/// Snapshot of both decisions and the connection for an unordered pair
#[derive(Debug, Clone)]
pub struct PairState {
    pub pair: PairKey,
    pub low_likes_high: bool,
    pub high_likes_low: bool,
    pub connection: Option<Connection>,
}

impl PairState {
    pub fn is_mutual(&self) -> bool {
        self.low_likes_high && self.high_likes_low
    }

    /// Mutual likes must always be backed by a connection
    pub fn is_consistent(&self) -> bool {
        !self.is_mutual() || self.connection.is_some()
    }
}

/// Turns complementary likes into exactly one connection
pub struct MutualMatchDetector {
    decisions: Arc<dyn DecisionStore>,
    connections: Arc<dyn ConnectionStore>,
}

impl MutualMatchDetector {
    pub fn new(decisions: Arc<dyn DecisionStore>, connections: Arc<dyn ConnectionStore>) -> Self {
        Self {
            decisions,
            connections,
        }
    }

    /// Run after `from` recorded `choice` on `to`
    ///
    /// A pass never touches connections. A like looks up the reverse
    /// decision and, when it is a like too, inserts the connection. Losing
    /// the insert race is not an error: the existing row comes back with
    /// `created = false`.
    pub async fn on_decision_recorded(
        &self,
        from_id: &str,
        to_id: &str,
        choice: Choice,
    ) -> Result<Detection, StoreError> {
        if choice == Choice::Pass {
            return Ok(Detection::default());
        }

        let reverse = self.decisions.get_decision(to_id, from_id).await?;
        if !matches!(reverse, Some(ref d) if d.choice == Choice::Like) {
            tracing::debug!("{} likes {}, waiting for the other side", from_id, to_id);
            return Ok(Detection::default());
        }

        let pair = PairKey::new(from_id, to_id)
            .ok_or_else(|| StoreError::Unavailable(format!("degenerate pair {}", from_id)))?;
        let outcome = self.connections.insert_connection(&pair).await?;

        if outcome.created {
            tracing::info!("Mutual match {} ({})", pair, outcome.connection.id);
        } else {
            tracing::debug!("Mutual match {} already connected", pair);
        }

        Ok(Detection {
            mutual: true,
            connection: Some(outcome.connection),
            created: outcome.created,
        })
    }

    pub async fn pair_state(&self, pair: &PairKey) -> Result<PairState, StoreError> {
        let forward = self.decisions.get_decision(pair.low(), pair.high()).await?;
        let backward = self.decisions.get_decision(pair.high(), pair.low()).await?;
        let connection = self.connections.get_connection(pair).await?;

        Ok(PairState {
            pair: pair.clone(),
            low_likes_high: forward.map_or(false, |d| d.choice == Choice::Like),
            high_likes_low: backward.map_or(false, |d| d.choice == Choice::Like),
            connection,
        })
    }

    /// Re-derive the connection from the ledger
    ///
    /// Creates the missing connection when both sides like each other.
    /// Existing connections are left alone.
    pub async fn reconcile_pair(&self, pair: &PairKey) -> Result<Detection, StoreError> {
        let state = self.pair_state(pair).await?;

        if !state.is_mutual() {
            return Ok(Detection {
                mutual: false,
                connection: state.connection,
                created: false,
            });
        }

        if let Some(connection) = state.connection {
            return Ok(Detection {
                mutual: true,
                connection: Some(connection),
                created: false,
            });
        }

        tracing::warn!("Repairing missing connection for {}", pair);
        let outcome = self.connections.insert_connection(pair).await?;

        Ok(Detection {
            mutual: true,
            connection: Some(outcome.connection),
            created: outcome.created,
        })
    }
}
