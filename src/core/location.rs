use crate::models::{Location, LocationTier};

/// Compare one location component, ignoring case and surrounding whitespace.
/// Blank values never match.
#[inline]
fn same_component(a: &str, b: &str) -> bool {
    let a = a.trim();
    let b = b.trim();
    !a.is_empty()
        && a.chars()
            .flat_map(char::to_lowercase)
            .eq(b.chars().flat_map(char::to_lowercase))
}

/// Calculate the proximity tier between two locations
///
/// An area only counts as shared within the same city, since area names
/// repeat across cities ("Old Town", "Centre").
pub fn location_tier(a: &Location, b: &Location) -> LocationTier {
    let same_city = same_component(&a.city, &b.city);

    if same_city && same_component(&a.area, &b.area) {
        LocationTier::SameArea
    } else if same_city {
        LocationTier::SameCity
    } else if same_component(&a.region, &b.region) {
        LocationTier::SameRegion
    } else {
        LocationTier::None
    }
}

/// Proximity signal in 0..=1
#[inline]
pub fn location_signal(tier: LocationTier) -> f64 {
    f64::from(tier.rank()) / f64::from(LocationTier::SameArea.rank())
}
