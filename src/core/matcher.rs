use crate::core::{
    filters::passes_hard_gates,
    location::location_tier,
    ranking::{rank, rank_in_place},
    scoring::calculate_compatibility,
    session::SessionSwipeCache,
};
use crate::models::{FilterPreferences, Profile, ScoredCandidate, ScoringWeights, Strategy};
use std::collections::HashSet;

/// Ranked candidate queue for one viewing session
///
/// Holds the scored set once; switching strategy only re-sorts it.
#[derive(Debug, Clone)]
pub struct CandidateQueue {
    strategy: Strategy,
    candidates: Vec<ScoredCandidate>,
    total_candidates: usize,
}

impl CandidateQueue {
    pub fn new(candidates: Vec<ScoredCandidate>, strategy: Strategy, total_candidates: usize) -> Self {
        Self {
            strategy,
            candidates: rank(candidates, strategy),
            total_candidates,
        }
    }

    /// Re-sort under another strategy. No scoring, no store I/O.
    pub fn set_strategy(&mut self, strategy: Strategy) {
        if self.strategy != strategy {
            rank_in_place(&mut self.candidates, strategy);
            self.strategy = strategy;
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn candidates(&self) -> &[ScoredCandidate] {
        &self.candidates
    }

    /// Number of profiles considered before gating
    pub fn total_candidates(&self) -> usize {
        self.total_candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// First `limit` candidates in the current order
    pub fn top(&self, limit: usize) -> Vec<ScoredCandidate> {
        self.candidates.iter().take(limit).cloned().collect()
    }

    /// Drop a candidate after the viewer decided on it
    pub fn remove(&mut self, candidate_id: &str) -> Option<ScoredCandidate> {
        let index = self.candidates.iter().position(|c| c.user_id == candidate_id)?;
        Some(self.candidates.remove(index))
    }

    pub fn into_candidates(self) -> Vec<ScoredCandidate> {
        self.candidates
    }
}

/// Candidate queue builder
///
/// # Pipeline Stages
/// 1. Exclusions: self, ledger-backed exclusions, session-hidden ids
/// 2. Hard gates: active, required interests, location radius
/// 3. Scoring: percentage and boost tags per pair
/// 4. Ranking under the requested strategy
#[derive(Debug, Clone)]
pub struct Matcher {
    weights: ScoringWeights,
}

impl Matcher {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn with_default_weights() -> Self {
        Self {
            weights: ScoringWeights::default(),
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Gate and score a single candidate; `None` when a hard gate excludes it
    pub fn score_candidate(
        &self,
        viewer: &Profile,
        preferences: &FilterPreferences,
        candidate: &Profile,
        position: usize,
    ) -> Option<ScoredCandidate> {
        let tier = location_tier(&viewer.location, &candidate.location);
        if !passes_hard_gates(viewer, preferences, candidate, tier) {
            return None;
        }

        let score = calculate_compatibility(viewer, preferences, candidate, &self.weights);

        Some(ScoredCandidate {
            user_id: candidate.user_id.clone(),
            name: candidate.name.clone(),
            location: candidate.location.clone(),
            child_ages_months: candidate.children.iter().map(|c| c.age_months).collect(),
            percentage: score.percentage,
            boosts: score.boosts,
            location_tier: score.location_tier,
            shared_interests: score.shared_interests,
            shared_lifestyle: score.shared_lifestyle,
            position,
            image_file_ids: candidate.image_file_ids.clone(),
            description: candidate.description.clone(),
        })
    }

    /// Build the ranked queue for a viewer
    ///
    /// # Arguments
    /// * `excluded` - ids the ledger says are already decided or connected
    /// * `session` - advisory ids swiped this session
    pub fn build_queue(
        &self,
        viewer: &Profile,
        preferences: &FilterPreferences,
        candidates: Vec<Profile>,
        excluded: &HashSet<String>,
        session: &SessionSwipeCache,
        strategy: Strategy,
    ) -> CandidateQueue {
        let total_candidates = candidates.len();
        let mut seen = HashSet::with_capacity(total_candidates);

        let scored: Vec<ScoredCandidate> = candidates
            .iter()
            // Stage 1: exclusions and duplicates from the store listing
            .filter(|profile| {
                profile.user_id != viewer.user_id
                    && !excluded.contains(&profile.user_id)
                    && !session.is_hidden(&profile.user_id)
            })
            .filter(|profile| seen.insert(profile.user_id.clone()))
            // Stage 2 & 3: gates and scores
            .enumerate()
            .filter_map(|(position, profile)| {
                self.score_candidate(viewer, preferences, profile, position)
            })
            .collect();

        tracing::debug!(
            "Scored {} of {} candidates for {} ({})",
            scored.len(),
            total_candidates,
            viewer.user_id,
            strategy
        );

        // Stage 4: ranking
        CandidateQueue::new(scored, strategy, total_candidates)
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_weights()
    }
}
