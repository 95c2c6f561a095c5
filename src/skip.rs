use crate::config::{ConfigError, SkipPredicate};
use regex::Regex;

/// Decides, before any probe, whether a URL is excluded from checking.
///
/// Two caller-supplied mechanisms feed this: a list of regular
/// expressions matched against the full URL string, and an optional
/// async predicate. The scheme gate lives in the coordinator since it
/// also applies when no skip configuration exists at all.
pub struct SkipPolicy {
    patterns: Vec<Regex>,
    predicate: Option<SkipPredicate>,
}

impl SkipPolicy {
    /// Compile the configured patterns. An invalid pattern aborts the
    /// run before the crawl starts.
    pub fn compile(
        patterns: &[String],
        predicate: Option<SkipPredicate>,
    ) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::InvalidSkipPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns,
            predicate,
        })
    }

    pub async fn should_skip(&self, url: &str) -> bool {
        if self.patterns.iter().any(|re| re.is_match(url)) {
            return true;
        }

        if let Some(predicate) = &self.predicate {
            if predicate(url.to_string()).await {
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_empty_policy_skips_nothing() {
        let policy = SkipPolicy::compile(&[], None).unwrap();
        assert!(!policy.should_skip("https://test.local/page").await);
    }

    #[tokio::test]
    async fn test_regex_match() {
        let patterns = vec![r"\.pdf$".to_string(), "private".to_string()];
        let policy = SkipPolicy::compile(&patterns, None).unwrap();

        assert!(policy.should_skip("https://test.local/doc.pdf").await);
        assert!(policy.should_skip("https://test.local/private/x").await);
        assert!(!policy.should_skip("https://test.local/public").await);
    }

    #[tokio::test]
    async fn test_async_predicate() {
        let predicate: SkipPredicate =
            Arc::new(|url: String| Box::pin(async move { url.contains("blocked") }));
        let policy = SkipPolicy::compile(&[], Some(predicate)).unwrap();

        assert!(policy.should_skip("https://test.local/blocked/a").await);
        assert!(!policy.should_skip("https://test.local/open").await);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let patterns = vec!["[unclosed".to_string()];
        assert!(matches!(
            SkipPolicy::compile(&patterns, None),
            Err(ConfigError::InvalidSkipPattern { .. })
        ));
    }
}
