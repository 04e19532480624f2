// Core algorithm exports
pub mod filters;
pub mod location;
pub mod matcher;
pub mod ranking;
pub mod scoring;
pub mod session;

pub use filters::{has_required_interests, lifestyle_tags, normalize_tag, passes_hard_gates};
pub use location::location_tier;
pub use matcher::{CandidateQueue, Matcher};
pub use ranking::{rank, rank_in_place};
pub use scoring::{calculate_compatibility, CompatibilityScore};
pub use session::SessionSwipeCache;
