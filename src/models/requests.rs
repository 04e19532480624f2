use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request for a viewer's ranked candidate queue
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CandidateQueueRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u16,
    /// Ids the client decided on this session but may not see reflected yet
    #[serde(default)]
    #[serde(alias = "hidden_ids", rename = "hiddenIds")]
    pub hidden_ids: Vec<String>,
}

fn default_limit() -> u16 {
    20
}

/// Request to record a like/pass
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DecideRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "candidate_id", rename = "candidateId")]
    pub candidate_id: String,
    pub choice: String,
    #[validate(length(max = 1000))]
    #[serde(default)]
    #[serde(alias = "opening_message", rename = "openingMessage")]
    pub opening_message: Option<String>,
}

/// Request to dissolve a connection
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UnmatchRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "other_user_id", rename = "otherUserId")]
    pub other_user_id: String,
}
