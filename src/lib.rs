//! Village Match - candidate ranking and mutual-match engine for the Village parent app
//!
//! Scores and ranks other parents for a viewer, records likes and passes in a
//! durable ledger, and turns complementary likes into exactly one connection.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{CandidateQueue, Matcher, SessionSwipeCache};
pub use models::{Choice, Connection, FilterPreferences, PairKey, Profile, ScoredCandidate, ScoringWeights, Strategy};
pub use services::{DecideOutcome, EngineError, EngineStores, MatchEngine, MemoryStore};
