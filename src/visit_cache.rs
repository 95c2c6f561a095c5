use dashmap::DashSet;

/// Set of URL strings that have been enqueued at least once this run.
///
/// The insert is the membership check: callers enqueue only when
/// `insert` returns true, which makes check-and-insert atomic and keeps
/// concurrent discoveries of the same URL from producing two probes.
#[derive(Debug, Default)]
pub struct VisitCache {
    seen: DashSet<String>,
}

impl VisitCache {
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
        }
    }

    /// Returns true when the URL was not yet present.
    pub fn insert(&self, url: &str) -> bool {
        self.seen.insert(url.to_string())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_insert_once() {
        let cache = VisitCache::new();
        assert!(cache.insert("https://test.local/a"));
        assert!(!cache.insert("https://test.local/a"));
        assert!(cache.contains("https://test.local/a"));
        assert!(!cache.contains("https://test.local/b"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_insert_admits_one() {
        let cache = Arc::new(VisitCache::new());
        let mut handles = Vec::new();

        for _ in 0..32 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.insert("https://test.local/contended")
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(cache.len(), 1);
    }
}
