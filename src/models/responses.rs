use serde::{Deserialize, Serialize};
use crate::models::domain::{ScoredCandidate, Strategy};

/// Response for the candidate queue endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateQueueResponse {
    pub candidates: Vec<ScoredCandidate>,
    pub strategy: Strategy,
    pub total_results: usize,
}

/// Response for the decide endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecideResponse {
    pub mutual: bool,
    #[serde(rename = "isFirstMatch")]
    pub is_first_match: bool,
    #[serde(rename = "connectionId")]
    pub connection_id: Option<String>,
    #[serde(rename = "wasNewDecision")]
    pub was_new_decision: bool,
    pub stale: bool,
}

/// Response for the unmatch endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmatchResponse {
    pub removed: bool,
}

/// Response for the connections endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionsResponse {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub connections: Vec<String>,
    pub count: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
    #[serde(default)]
    pub retryable: bool,
}
