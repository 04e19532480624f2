use crate::models::{BoostTag, ScoredCandidate, Strategy};
use std::cmp::Ordering;

/// Reorder an already scored candidate set under a strategy
///
/// Scores are never recomputed here; only the order changes. Every strategy
/// ends with the candidate's insertion position, so identical input always
/// yields identical output.
pub fn rank(mut candidates: Vec<ScoredCandidate>, strategy: Strategy) -> Vec<ScoredCandidate> {
    rank_in_place(&mut candidates, strategy);
    candidates
}

/// In-place variant of [`rank`]
pub fn rank_in_place(candidates: &mut [ScoredCandidate], strategy: Strategy) {
    candidates.sort_by(|a, b| compare(a, b, strategy));
}

fn compare(a: &ScoredCandidate, b: &ScoredCandidate, strategy: Strategy) -> Ordering {
    let primary = match strategy {
        Strategy::Recommended => b
            .percentage
            .cmp(&a.percentage)
            .then_with(|| b.boosts.len().cmp(&a.boosts.len())),
        Strategy::Nearby => b
            .location_tier
            .cmp(&a.location_tier)
            .then_with(|| b.percentage.cmp(&a.percentage)),
        Strategy::Lifestyle => boost_first(a, b, BoostTag::SharedLifestyle)
            .then_with(|| b.percentage.cmp(&a.percentage)),
        Strategy::SameStage => boost_first(a, b, BoostTag::SameStage)
            .then_with(|| b.percentage.cmp(&a.percentage)),
    };

    primary.then_with(|| a.position.cmp(&b.position))
}

/// Candidates carrying `tag` sort before those without it
#[inline]
fn boost_first(a: &ScoredCandidate, b: &ScoredCandidate, tag: BoostTag) -> Ordering {
    b.has_boost(tag).cmp(&a.has_boost(tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Location, LocationTier};
    use std::collections::BTreeSet;

    fn create_candidate(id: &str, position: usize, percentage: u8, tier: LocationTier, boosts: &[BoostTag]) -> ScoredCandidate {
        ScoredCandidate {
            user_id: id.to_string(),
            name: format!("Parent {}", id),
            location: Location::default(),
            child_ages_months: vec![],
            percentage,
            boosts: boosts.iter().copied().collect::<BTreeSet<_>>(),
            location_tier: tier,
            shared_interests: vec![],
            shared_lifestyle: vec![],
            position,
            image_file_ids: vec![],
            description: None,
        }
    }

    fn ids(candidates: &[ScoredCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.user_id.as_str()).collect()
    }

    fn sample() -> Vec<ScoredCandidate> {
        vec![
            create_candidate("a", 0, 60, LocationTier::SameRegion, &[BoostTag::SameStage]),
            create_candidate("b", 1, 80, LocationTier::None, &[]),
            create_candidate("c", 2, 60, LocationTier::SameArea, &[BoostTag::SameArea, BoostTag::SharedLifestyle]),
            create_candidate("d", 3, 40, LocationTier::SameCity, &[BoostTag::SameCity, BoostTag::SharedLifestyle]),
        ]
    }

    #[test]
    fn test_recommended_orders_by_percentage_then_boosts() {
        let ranked = rank(sample(), Strategy::Recommended);
        assert_eq!(ids(&ranked), vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn test_recommended_equal_score_and_boosts_keeps_insertion_order() {
        let candidates = vec![
            create_candidate("x", 0, 50, LocationTier::None, &[BoostTag::SameStage]),
            create_candidate("y", 1, 50, LocationTier::None, &[BoostTag::SharedLifestyle]),
        ];
        let ranked = rank(candidates, Strategy::Recommended);
        assert_eq!(ids(&ranked), vec!["x", "y"]);
    }

    #[test]
    fn test_nearby() {
        let ranked = rank(sample(), Strategy::Nearby);
        assert_eq!(ids(&ranked), vec!["c", "d", "a", "b"]);
    }

    #[test]
    fn test_lifestyle() {
        let ranked = rank(sample(), Strategy::Lifestyle);
        assert_eq!(ids(&ranked), vec!["c", "d", "b", "a"]);
    }

    #[test]
    fn test_same_stage() {
        let ranked = rank(sample(), Strategy::SameStage);
        assert_eq!(ids(&ranked), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_rank_is_stable_across_calls_and_reorders() {
        for strategy in Strategy::ALL {
            let once = rank(sample(), strategy);
            let twice = rank(once.clone(), strategy);
            assert_eq!(ids(&once), ids(&twice));
        }

        // Switching away and back lands on the same order
        let recommended = rank(sample(), Strategy::Recommended);
        let via_nearby = rank(rank(sample(), Strategy::Nearby), Strategy::Recommended);
        assert_eq!(ids(&recommended), ids(&via_nearby));
    }

    #[test]
    fn test_rank_does_not_touch_scores() {
        let before: Vec<(String, u8)> = sample().into_iter().map(|c| (c.user_id, c.percentage)).collect();
        let mut after: Vec<(String, u8)> = rank(sample(), Strategy::Nearby)
            .into_iter()
            .map(|c| (c.user_id, c.percentage))
            .collect();
        after.sort();
        assert_eq!(before, after);
    }
}
