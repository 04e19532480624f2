use crate::models::MatchEvent;
use tokio::sync::broadcast;

/// Broadcasts decision and connection changes to realtime subscribers
///
/// Publishing never blocks and never fails the caller. Subscribers that fall
/// behind lose the oldest events (`RecvError::Lagged`) and should reload
/// state from the stores.
#[derive(Clone)]
pub struct MatchEventBus {
    tx: broadcast::Sender<MatchEvent>,
}

impl MatchEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns how many subscribers received the event
    pub fn publish(&self, event: MatchEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(_) => {
                tracing::trace!("No subscribers for match event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for MatchEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Choice, PairKey};

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = MatchEventBus::new(4);
        let delivered = bus.publish(MatchEvent::ConnectionRemoved {
            users: PairKey::new("a", "b").unwrap(),
        });
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = MatchEventBus::new(4);
        let mut rx = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);

        let event = MatchEvent::DecisionRecorded {
            from: "a".to_string(),
            to: "b".to_string(),
            choice: Choice::Like,
        };
        assert_eq!(bus.publish(event.clone()), 1);
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = MatchEventBus::new(1);
        let mut rx = bus.subscribe();
        let pair = PairKey::new("a", "b").unwrap();

        bus.publish(MatchEvent::ConnectionRemoved { users: pair.clone() });
        bus.publish(MatchEvent::ConnectionRemoved { users: pair });

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
    }
}
