use std::collections::HashSet;

/// Candidates decided on during the current viewing session
///
/// Masks read-after-write latency: a candidate the viewer just swiped on is
/// hidden until the decision ledger reflects it. Advisory only. The ledger
/// stays the source of truth, and ids it confirms are dropped from here.
#[derive(Debug, Clone, Default)]
pub struct SessionSwipeCache {
    hidden: HashSet<String>,
}

impl SessionSwipeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache from ids a client reports as already swiped
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hidden: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn hide(&mut self, candidate_id: impl Into<String>) {
        self.hidden.insert(candidate_id.into());
    }

    pub fn is_hidden(&self, candidate_id: &str) -> bool {
        self.hidden.contains(candidate_id)
    }

    /// Undo an optimistic hide after the decision finally failed
    pub fn unhide(&mut self, candidate_id: &str) -> bool {
        self.hidden.remove(candidate_id)
    }

    /// The store now reflects these decisions; stop masking them
    pub fn confirm<'a, I>(&mut self, confirmed: I) -> usize
    where
        I: IntoIterator<Item = &'a String>,
    {
        let before = self.hidden.len();
        for id in confirmed {
            self.hidden.remove(id);
        }
        before - self.hidden.len()
    }

    /// Full session reload
    pub fn clear(&mut self) {
        self.hidden.clear();
    }

    pub fn len(&self) -> usize {
        self.hidden.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hidden.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hide_and_unhide() {
        let mut cache = SessionSwipeCache::new();
        cache.hide("c1");
        assert!(cache.is_hidden("c1"));
        assert!(!cache.is_hidden("c2"));

        assert!(cache.unhide("c1"));
        assert!(!cache.is_hidden("c1"));
        assert!(!cache.unhide("c1"));
    }

    #[test]
    fn test_confirm_drops_store_backed_ids() {
        let mut cache = SessionSwipeCache::from_ids(["c1", "c2", "c3"]);
        let confirmed = vec!["c1".to_string(), "c3".to_string(), "other".to_string()];

        assert_eq!(cache.confirm(&confirmed), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.is_hidden("c2"));
    }

    #[test]
    fn test_clear() {
        let mut cache = SessionSwipeCache::from_ids(vec!["c1".to_string()]);
        cache.clear();
        assert!(cache.is_empty());
    }
}
