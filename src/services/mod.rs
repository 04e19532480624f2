// Service exports
pub mod appwrite;
pub mod cache;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod memory;
pub mod mutual;
pub mod postgres;
pub mod store;

pub use appwrite::{AppwriteClient, AppwriteCollections, AppwriteError};
pub use cache::{CacheError, CacheKey, CacheManager, CacheStats, CachedProfileStore};
pub use engine::{
    parse_choice, parse_strategy, DecideOutcome, EngineError, EngineStores, MatchEngine,
    RecheckReport,
};
pub use events::MatchEventBus;
pub use ledger::{DecisionLedger, LedgerError, RecordedDecision};
pub use memory::MemoryStore;
pub use mutual::{Detection, MutualMatchDetector, PairState};
pub use postgres::{PostgresClient, PostgresError};
pub use store::{
    ChatSink, ConnectionStore, DecisionStore, InsertOutcome, NotificationSink, ProfileStore,
    StoreError, UpsertOutcome,
};
