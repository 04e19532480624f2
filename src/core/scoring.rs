use crate::core::filters::{lifestyle_tags, normalized_set};
use crate::core::location::{location_signal, location_tier};
use crate::models::{BoostTag, FilterPreferences, LocationTier, Profile, ScoringWeights};
use std::collections::BTreeSet;

/// Score of a (viewer, candidate) pair
#[derive(Debug, Clone, PartialEq)]
pub struct CompatibilityScore {
    pub percentage: u8,
    pub boosts: BTreeSet<BoostTag>,
    pub location_tier: LocationTier,
    pub shared_interests: Vec<String>,
    pub shared_lifestyle: Vec<String>,
}

/// Calculate the compatibility percentage (0-100) and boost tags for a pair
///
/// Scoring formula, normalized by the sum of the weights in use:
/// score = (
///     location_score * location +      # same area > same city > same region
///     child_age_score * child_age +    # closest child pair inside the ± window
///     interest_score * interests +     # overlap ratio against the threshold
///     lifestyle_score * lifestyle      # x multiplier with lifestyle priority
/// )
///
/// Pure: the result depends on the two profiles, the viewer's preferences
/// and the weights only.
pub fn calculate_compatibility(
    viewer: &Profile,
    preferences: &FilterPreferences,
    candidate: &Profile,
    weights: &ScoringWeights,
) -> CompatibilityScore {
    // Location tier
    let tier = location_tier(&viewer.location, &candidate.location);
    let location_score = location_signal(tier);

    // Children's ages
    let gap = smallest_child_gap(viewer, candidate);
    let window = if preferences.age_proximity.enabled {
        preferences.age_proximity.months
    } else {
        weights.same_stage_window_months
    };
    let child_age_score = calculate_child_age_score(gap, window);

    // Interest overlap
    let viewer_interests = normalized_set(viewer.interests.iter());
    let candidate_interests = normalized_set(candidate.interests.iter());
    let shared_interests: Vec<String> = viewer_interests
        .intersection(&candidate_interests)
        .cloned()
        .collect();
    let overlap = overlap_ratio(shared_interests.len(), viewer_interests.len());
    let interest_score = calculate_interest_score(overlap, preferences.interest_overlap_threshold);

    // Lifestyle intersection
    let viewer_lifestyle = lifestyle_tags(viewer);
    let candidate_lifestyle = lifestyle_tags(candidate);
    let shared_lifestyle: Vec<String> = viewer_lifestyle
        .intersection(&candidate_lifestyle)
        .cloned()
        .collect();
    let lifestyle_score = calculate_lifestyle_score(
        shared_lifestyle.len(),
        viewer_lifestyle.len().min(candidate_lifestyle.len()),
    );

    let lifestyle_weight = if preferences.lifestyle_priority {
        weights.lifestyle * weights.lifestyle_priority_multiplier
    } else {
        weights.lifestyle
    };

    let total_weight = weights.location + weights.child_age + weights.interests + lifestyle_weight;
    let weighted = location_score * weights.location
        + child_age_score * weights.child_age
        + interest_score * weights.interests
        + lifestyle_score * lifestyle_weight;

    let percentage = if total_weight > 0.0 {
        (weighted / total_weight * 100.0).round().clamp(0.0, 100.0) as u8
    } else {
        0
    };

    // Boost tags
    let mut boosts = BTreeSet::new();
    match tier {
        LocationTier::SameArea => {
            boosts.insert(BoostTag::SameArea);
        }
        LocationTier::SameCity => {
            boosts.insert(BoostTag::SameCity);
        }
        _ => {}
    }
    if gap.is_some_and(|g| g <= weights.same_stage_window_months) {
        boosts.insert(BoostTag::SameStage);
    }
    if !shared_lifestyle.is_empty() {
        boosts.insert(BoostTag::SharedLifestyle);
    }
    if !shared_interests.is_empty()
        && overlap * 100.0 >= f64::from(preferences.interest_overlap_threshold)
    {
        boosts.insert(BoostTag::SharedInterests);
    }

    CompatibilityScore {
        percentage,
        boosts,
        location_tier: tier,
        shared_interests,
        shared_lifestyle,
    }
}

/// Smallest age gap in months over all child pairs across the two profiles
pub fn smallest_child_gap(a: &Profile, b: &Profile) -> Option<u16> {
    a.children
        .iter()
        .flat_map(|x| b.children.iter().map(move |y| x.age_months.abs_diff(y.age_months)))
        .min()
}

/// Child age score (0-1)
/// Full credit for identical ages, half credit at the window edge, zero outside
#[inline]
fn calculate_child_age_score(gap: Option<u16>, window_months: u16) -> f64 {
    let Some(gap) = gap else {
        return 0.0;
    };

    if window_months == 0 {
        return if gap == 0 { 1.0 } else { 0.0 };
    }

    if gap > window_months {
        return 0.0;
    }

    1.0 - f64::from(gap) / (2.0 * f64::from(window_months))
}

/// Share of the viewer's interests the candidate also has
#[inline]
fn overlap_ratio(shared: usize, viewer_total: usize) -> f64 {
    if viewer_total == 0 {
        return 0.0;
    }
    shared as f64 / viewer_total as f64
}

/// Interest score (0-1)
/// Meeting the viewer's overlap threshold earns full credit
#[inline]
fn calculate_interest_score(overlap: f64, threshold_percent: u8) -> f64 {
    if threshold_percent == 0 {
        return overlap;
    }
    (overlap * 100.0 / f64::from(threshold_percent)).min(1.0)
}

/// Lifestyle score (0-1), shared tags over the smaller of the two tag sets
#[inline]
fn calculate_lifestyle_score(shared: usize, smaller_set: usize) -> f64 {
    if smaller_set == 0 {
        return 0.0;
    }
    (shared as f64 / smaller_set as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Child, Location};

    fn create_test_profile(id: &str, city: &str, area: &str, child_ages: &[u16], interests: &[&str]) -> Profile {
        Profile {
            user_id: id.to_string(),
            name: format!("Parent {}", id),
            location: Location {
                region: "Bavaria".to_string(),
                city: city.to_string(),
                area: area.to_string(),
            },
            children: child_ages
                .iter()
                .map(|&age_months| Child { age_months, name: None, gender: None })
                .collect(),
            interests: interests.iter().map(|s| s.to_string()).collect(),
            lifestyle: vec![],
            is_active: true,
            description: None,
            image_file_ids: vec![],
            created_at: None,
        }
    }

    #[test]
    fn test_calculate_compatibility_range_and_boosts() {
        let viewer = create_test_profile("v", "Munich", "Schwabing", &[10], &["coffee", "breastfeeding"]);
        let candidate = create_test_profile("c", "Munich", "Schwabing", &[14], &["Coffee", "Breast-feeding", "breastfeeding"]);
        let prefs = FilterPreferences::permissive("v");

        let score = calculate_compatibility(&viewer, &prefs, &candidate, &ScoringWeights::default());

        assert!(score.percentage <= 100);
        assert_eq!(score.location_tier, LocationTier::SameArea);
        assert!(score.boosts.contains(&BoostTag::SameArea));
        assert!(!score.boosts.contains(&BoostTag::SameCity));
        assert!(score.boosts.contains(&BoostTag::SameStage));
        assert!(score.boosts.contains(&BoostTag::SharedLifestyle));
        assert!(score.boosts.contains(&BoostTag::SharedInterests));
        assert_eq!(score.shared_lifestyle, vec!["breastfeeding".to_string()]);
    }

    #[test]
    fn test_identical_profiles_score_full() {
        let viewer = create_test_profile("v", "Munich", "Schwabing", &[10], &["breastfeeding"]);
        let candidate = create_test_profile("c", "Munich", "Schwabing", &[10], &["breastfeeding"]);
        let prefs = FilterPreferences::permissive("v");

        let score = calculate_compatibility(&viewer, &prefs, &candidate, &ScoringWeights::default());
        assert_eq!(score.percentage, 100);
    }

    #[test]
    fn test_unrelated_profiles_score_zero() {
        let viewer = create_test_profile("v", "Munich", "Schwabing", &[10], &["coffee"]);
        let mut candidate = create_test_profile("c", "Leeds", "Headingley", &[80], &["rugby"]);
        candidate.location.region = "Yorkshire".to_string();
        let prefs = FilterPreferences::permissive("v");

        let score = calculate_compatibility(&viewer, &prefs, &candidate, &ScoringWeights::default());
        assert_eq!(score.percentage, 0);
        assert!(score.boosts.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let viewer = create_test_profile("v", "Munich", "Giesing", &[6, 30], &["coffee", "outdoors"]);
        let candidate = create_test_profile("c", "Munich", "Schwabing", &[20], &["outdoors"]);
        let prefs = FilterPreferences::permissive("v");
        let weights = ScoringWeights::default();

        let first = calculate_compatibility(&viewer, &prefs, &candidate, &weights);
        for _ in 0..10 {
            assert_eq!(calculate_compatibility(&viewer, &prefs, &candidate, &weights), first);
        }
    }

    #[test]
    fn test_child_age_score() {
        assert_eq!(calculate_child_age_score(Some(0), 12), 1.0);
        assert_eq!(calculate_child_age_score(Some(12), 12), 0.5);
        assert_eq!(calculate_child_age_score(Some(13), 12), 0.0);
        assert_eq!(calculate_child_age_score(None, 12), 0.0);
    }

    #[test]
    fn test_smallest_child_gap() {
        let a = create_test_profile("a", "Munich", "", &[5, 40], &[]);
        let b = create_test_profile("b", "Munich", "", &[36, 90], &[]);
        assert_eq!(smallest_child_gap(&a, &b), Some(4));

        let none = create_test_profile("n", "Munich", "", &[], &[]);
        assert_eq!(smallest_child_gap(&a, &none), None);
    }

    #[test]
    fn test_interest_threshold() {
        // Half overlap meets a 50% threshold in full
        assert_eq!(calculate_interest_score(0.5, 50), 1.0);
        assert_eq!(calculate_interest_score(0.25, 50), 0.5);
        assert_eq!(calculate_interest_score(0.25, 0), 0.25);
    }

    #[test]
    fn test_shared_interests_boost_respects_threshold() {
        let viewer = create_test_profile("v", "Munich", "", &[], &["coffee", "hiking", "yoga", "books"]);
        let candidate = create_test_profile("c", "Munich", "", &[], &["coffee"]);
        let mut prefs = FilterPreferences::permissive("v");

        let weights = ScoringWeights::default();
        let score = calculate_compatibility(&viewer, &prefs, &candidate, &weights);
        assert!(score.boosts.contains(&BoostTag::SharedInterests));

        prefs.interest_overlap_threshold = 50;
        let score = calculate_compatibility(&viewer, &prefs, &candidate, &weights);
        assert!(!score.boosts.contains(&BoostTag::SharedInterests));
    }

    #[test]
    fn test_lifestyle_priority_raises_lifestyle_matches() {
        let viewer = create_test_profile("v", "Munich", "", &[], &["vegan", "coffee"]);
        let candidate = create_test_profile("c", "Hamburg", "", &[], &["vegan"]);
        let mut prefs = FilterPreferences::permissive("v");
        let weights = ScoringWeights::default();

        let plain = calculate_compatibility(&viewer, &prefs, &candidate, &weights);
        prefs.lifestyle_priority = true;
        let prioritised = calculate_compatibility(&viewer, &prefs, &candidate, &weights);

        assert!(prioritised.percentage > plain.percentage);
    }

    #[test]
    fn test_age_proximity_window_from_preferences() {
        let viewer = create_test_profile("v", "Munich", "", &[10], &[]);
        let candidate = create_test_profile("c", "Hamburg", "", &[16], &[]);
        let mut prefs = FilterPreferences::permissive("v");
        let weights = ScoringWeights::default();

        let default_window = calculate_compatibility(&viewer, &prefs, &candidate, &weights);

        prefs.age_proximity.enabled = true;
        prefs.age_proximity.months = 3;
        let narrow_window = calculate_compatibility(&viewer, &prefs, &candidate, &weights);

        assert!(default_window.percentage > narrow_window.percentage);
        // The boost keeps the fixed stage window regardless of the filter
        assert!(narrow_window.boosts.contains(&BoostTag::SameStage));
    }
}
