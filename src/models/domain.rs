use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Where a parent lives, coarsest to finest: region > city > area
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub area: String,
}

/// A child listed on a parent's profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Child {
    #[serde(rename = "ageMonths")]
    pub age_months: u16,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

/// Parent profile as held by the profile store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub children: Vec<Child>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub lifestyle: Vec<String>,
    #[serde(rename = "isActive", default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "imageFileIds", default)]
    pub image_file_ids: Vec<String>,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

fn default_true() -> bool { true }

/// How far from the viewer a candidate may live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationRadius {
    Area,
    City,
    Region,
    #[default]
    Anywhere,
}

impl LocationRadius {
    /// Lowest proximity tier a candidate must reach under this radius
    pub fn min_tier(self) -> LocationTier {
        match self {
            LocationRadius::Area => LocationTier::SameArea,
            LocationRadius::City => LocationTier::SameCity,
            LocationRadius::Region => LocationTier::SameRegion,
            LocationRadius::Anywhere => LocationTier::None,
        }
    }
}

/// Child-age proximity filter, a ± window in months
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct AgeProximity {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_age_window")]
    #[validate(range(min = 1, max = 216))]
    pub months: u16,
}

impl Default for AgeProximity {
    fn default() -> Self {
        Self {
            enabled: false,
            months: default_age_window(),
        }
    }
}

fn default_age_window() -> u16 { 12 }

/// Per-user filter preferences
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FilterPreferences {
    #[serde(rename = "userId")]
    #[validate(length(min = 1))]
    pub user_id: String,
    #[serde(rename = "locationRadius", default)]
    pub location_radius: LocationRadius,
    #[serde(rename = "ageProximity", default)]
    #[validate(nested)]
    pub age_proximity: AgeProximity,
    #[serde(rename = "interestOverlapThreshold", default)]
    #[validate(range(max = 100))]
    pub interest_overlap_threshold: u8,
    #[serde(rename = "requiredInterests", default)]
    pub required_interests: Vec<String>,
    #[serde(rename = "lifestylePriority", default)]
    pub lifestyle_priority: bool,
}

impl FilterPreferences {
    /// Preferences that filter nothing
    pub fn permissive(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            location_radius: LocationRadius::Anywhere,
            age_proximity: AgeProximity::default(),
            interest_overlap_threshold: 0,
            required_interests: Vec::new(),
            lifestyle_priority: false,
        }
    }
}

/// A swipe decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Like,
    Pass,
}

impl Choice {
    pub fn as_str(self) -> &'static str {
        match self {
            Choice::Like => "like",
            Choice::Pass => "pass",
        }
    }
}

impl FromStr for Choice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "like" | "liked" => Ok(Choice::Like),
            "pass" | "passed" => Ok(Choice::Pass),
            other => Err(format!("unknown choice '{}', expected like or pass", other)),
        }
    }
}

/// Recorded decision for an ordered pair (from -> to)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(rename = "fromId")]
    pub from_id: String,
    #[serde(rename = "toId")]
    pub to_id: String,
    pub choice: Choice,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Canonical form of an unordered user pair, `low < high`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    low: String,
    high: String,
}

impl PairKey {
    /// Returns `None` for a pair of identical ids
    pub fn new(a: &str, b: &str) -> Option<Self> {
        match a.cmp(b) {
            std::cmp::Ordering::Less => Some(Self { low: a.to_string(), high: b.to_string() }),
            std::cmp::Ordering::Greater => Some(Self { low: b.to_string(), high: a.to_string() }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn low(&self) -> &str {
        &self.low
    }

    pub fn high(&self) -> &str {
        &self.high
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.low == user_id || self.high == user_id
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.low, self.high)
    }
}

/// Established mutual connection, one per unordered pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: uuid::Uuid,
    #[serde(rename = "userLow")]
    pub user_low: String,
    #[serde(rename = "userHigh")]
    pub user_high: String,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Connection {
    pub fn pair(&self) -> PairKey {
        PairKey {
            low: self.user_low.clone(),
            high: self.user_high.clone(),
        }
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.user_low == user_id || self.user_high == user_id
    }

    /// The member of the pair that is not `user_id`
    pub fn other(&self, user_id: &str) -> Option<&str> {
        if self.user_low == user_id {
            Some(&self.user_high)
        } else if self.user_high == user_id {
            Some(&self.user_low)
        } else {
            None
        }
    }
}

/// Location proximity between two profiles, ordered weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationTier {
    None,
    SameRegion,
    SameCity,
    SameArea,
}

impl LocationTier {
    pub fn rank(self) -> u8 {
        match self {
            LocationTier::None => 0,
            LocationTier::SameRegion => 1,
            LocationTier::SameCity => 2,
            LocationTier::SameArea => 3,
        }
    }
}

/// Qualitative compatibility signal shown next to the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostTag {
    SameArea,
    SameCity,
    SameStage,
    SharedLifestyle,
    SharedInterests,
}

/// Named reordering policy over an already scored candidate set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Recommended,
    Nearby,
    Lifestyle,
    SameStage,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Recommended,
        Strategy::Nearby,
        Strategy::Lifestyle,
        Strategy::SameStage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Recommended => "recommended",
            Strategy::Nearby => "nearby",
            Strategy::Lifestyle => "lifestyle",
            Strategy::SameStage => "same_stage",
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "recommended" | "composite" => Ok(Strategy::Recommended),
            "nearby" | "nearest" => Ok(Strategy::Nearby),
            "lifestyle" => Ok(Strategy::Lifestyle),
            "same_stage" | "stage" => Ok(Strategy::SameStage),
            other => Err(format!(
                "unknown strategy '{}', expected one of: recommended, nearby, lifestyle, same_stage",
                other
            )),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate with its pair score attached, ready for ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: String,
    pub location: Location,
    #[serde(rename = "childAgesMonths")]
    pub child_ages_months: Vec<u16>,
    pub percentage: u8,
    pub boosts: BTreeSet<BoostTag>,
    #[serde(rename = "locationTier")]
    pub location_tier: LocationTier,
    #[serde(rename = "sharedInterests")]
    pub shared_interests: Vec<String>,
    #[serde(rename = "sharedLifestyle")]
    pub shared_lifestyle: Vec<String>,
    /// Insertion index, the final tie-break of every strategy
    pub position: usize,
    #[serde(rename = "imageFileIds")]
    pub image_file_ids: Vec<String>,
    pub description: Option<String>,
}

impl ScoredCandidate {
    pub fn has_boost(&self, tag: BoostTag) -> bool {
        self.boosts.contains(&tag)
    }
}

/// Scoring weights and tuning values
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub location: f64,
    pub child_age: f64,
    pub interests: f64,
    pub lifestyle: f64,
    /// Applied to the lifestyle weight when the viewer prioritises lifestyle
    pub lifestyle_priority_multiplier: f64,
    /// Child age gap, in months, that still counts as the same stage
    pub same_stage_window_months: u16,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            location: 0.30,
            child_age: 0.30,
            interests: 0.25,
            lifestyle: 0.15,
            lifestyle_priority_multiplier: 2.0,
            same_stage_window_months: 12,
        }
    }
}

/// Kinds of notification the engine hands to the notification sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewMatch,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::NewMatch => "new_match",
        }
    }
}

/// Realtime change published to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEvent {
    DecisionRecorded {
        from: String,
        to: String,
        choice: Choice,
    },
    ConnectionCreated {
        connection_id: uuid::Uuid,
        users: PairKey,
    },
    ConnectionRemoved {
        users: PairKey,
    },
}

impl MatchEvent {
    pub fn involves(&self, user_id: &str) -> bool {
        match self {
            MatchEvent::DecisionRecorded { from, to, .. } => from == user_id || to == user_id,
            MatchEvent::ConnectionCreated { users, .. } => users.contains(user_id),
            MatchEvent::ConnectionRemoved { users } => users.contains(user_id),
        }
    }
}
