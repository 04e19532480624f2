// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    AgeProximity, BoostTag, Child, Choice, Connection, Decision, FilterPreferences, Location,
    LocationRadius, LocationTier, MatchEvent, NotificationKind, PairKey, Profile, ScoredCandidate,
    ScoringWeights, Strategy,
};
pub use requests::{CandidateQueueRequest, DecideRequest, UnmatchRequest};
pub use responses::{
    CandidateQueueResponse, ConnectionsResponse, DecideResponse, ErrorResponse, HealthResponse,
    UnmatchResponse,
};
