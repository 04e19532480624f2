use crate::models::{FilterPreferences, LocationTier, Profile};
use std::collections::BTreeSet;

/// Tags that count as lifestyle signals, in normalized form
pub const LIFESTYLE_VOCABULARY: &[&str] = &[
    "attachment parenting",
    "baby led weaning",
    "babywearing",
    "breastfeeding",
    "co sleeping",
    "formula feeding",
    "gentle parenting",
    "home schooling",
    "montessori",
    "outdoors",
    "single parent",
    "stay at home parent",
    "vegan",
    "vegetarian",
    "working parent",
];

/// Normalize a tag for comparison: lowercase, punctuation becomes a
/// separator, whitespace collapsed.
///
/// `"Baby-Led  Weaning!"` and `"baby_led weaning"` both become
/// `"baby led weaning"`.
pub fn normalize_tag(tag: &str) -> String {
    let mut spaced = String::with_capacity(tag.len());
    for c in tag.chars() {
        if c.is_alphanumeric() {
            spaced.extend(c.to_lowercase());
        } else {
            spaced.push(' ');
        }
    }

    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a list of tags into a set, dropping empties
pub fn normalized_set<'a, I>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String>,
{
    tags.into_iter()
        .map(|t| normalize_tag(t))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Effective lifestyle tags of a profile: explicit lifestyle tags and
/// interests, restricted to the lifestyle vocabulary
pub fn lifestyle_tags(profile: &Profile) -> BTreeSet<String> {
    normalized_set(profile.lifestyle.iter().chain(profile.interests.iter()))
        .into_iter()
        .filter(|tag| LIFESTYLE_VOCABULARY.contains(&tag.as_str()))
        .collect()
}

/// Required-interest gate: every required tag must be among the
/// candidate's interests or lifestyle tags
#[inline]
pub fn has_required_interests(candidate: &Profile, preferences: &FilterPreferences) -> bool {
    if preferences.required_interests.is_empty() {
        return true;
    }

    let offered = normalized_set(candidate.interests.iter().chain(candidate.lifestyle.iter()));
    normalized_set(preferences.required_interests.iter()).is_subset(&offered)
}

/// Location radius gate
#[inline]
pub fn within_radius(tier: LocationTier, preferences: &FilterPreferences) -> bool {
    tier >= preferences.location_radius.min_tier()
}

/// Hard gates a candidate must pass before it is scored at all
///
/// A candidate failing any gate is excluded, never down-ranked.
pub fn passes_hard_gates(
    viewer: &Profile,
    preferences: &FilterPreferences,
    candidate: &Profile,
    tier: LocationTier,
) -> bool {
    if candidate.user_id == viewer.user_id || !candidate.is_active {
        return false;
    }

    if !has_required_interests(candidate, preferences) {
        return false;
    }

    within_radius(tier, preferences)
}
