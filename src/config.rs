use crate::probe;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

/// Caller-supplied asynchronous skip check. Receives the URL string and
/// returns true to exclude it from probing.
pub type SkipPredicate =
    Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync>;

/// Errors raised before the crawl starts. These are fatal: nothing is
/// enqueued when configuration is rejected.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no paths were provided")]
    EmptyPaths,

    #[error("cannot mix HTTP URLs and filesystem paths in one run")]
    MixedInputs,

    #[error("serverRoot cannot be combined with HTTP inputs")]
    ServerRootWithRemote,

    #[error("invalid start URL '{url}': {source}")]
    InvalidStartUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("invalid skip pattern '{pattern}': {source}")]
    InvalidSkipPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("glob '{0}' matched no files")]
    GlobNoMatches(String),

    #[error("failed to read glob match: {0}")]
    GlobIo(#[from] glob::GlobError),

    #[error("failed to start local server: {0}")]
    ServerBind(std::io::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] probe::ProbeError),
}

/// Where a run's inputs point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// http:// or https:// URLs, probed directly
    Remote,
    /// Filesystem paths or globs, served through the local bridge
    Local,
}

/// Effective configuration consumed by the crawl engine.
#[derive(Clone)]
pub struct CheckerOptions {
    /// Starting URLs or filesystem globs
    pub paths: Vec<String>,

    /// Maximum number of tasks in flight
    pub concurrency: usize,

    /// Follow same-origin, same-prefix links transitively
    pub recurse: bool,

    /// Per-request timeout; None or 0 disables the client deadline
    pub timeout_ms: Option<u64>,

    /// Regex patterns; a match marks the URL SKIPPED
    pub links_to_skip: Vec<String>,

    /// Async skip check, consulted after the regex list
    pub skip_predicate: Option<SkipPredicate>,

    /// Convert .md files to HTML in the local bridge; None = auto-detect
    /// from the input paths
    pub markdown: Option<bool>,

    /// Root directory for local mode; derived from the inputs when unset
    pub server_root: Option<PathBuf>,

    /// Whether the local server renders directory indexes
    pub directory_listing: bool,

    /// Local server port; random in [5000, 6000] when unset
    pub port: Option<u16>,

    /// User-Agent sent on every probe
    pub user_agent: String,
}

impl CheckerOptions {
    pub const DEFAULT_CONCURRENCY: usize = 100;

    pub fn new(paths: Vec<String>) -> Self {
        Self {
            paths,
            concurrency: Self::DEFAULT_CONCURRENCY,
            recurse: false,
            timeout_ms: None,
            links_to_skip: Vec::new(),
            skip_predicate: None,
            markdown: None,
            server_root: None,
            directory_listing: false,
            port: None,
            user_agent: probe::DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Classify the inputs and reject invalid combinations.
    pub fn input_kind(&self) -> Result<InputKind, ConfigError> {
        if self.paths.is_empty() {
            return Err(ConfigError::EmptyPaths);
        }

        let remote_count = self.paths.iter().filter(|p| is_remote_path(p)).count();

        if remote_count == 0 {
            return Ok(InputKind::Local);
        }

        if remote_count < self.paths.len() {
            return Err(ConfigError::MixedInputs);
        }

        if self.server_root.is_some() {
            return Err(ConfigError::ServerRootWithRemote);
        }

        Ok(InputKind::Remote)
    }

    /// Effective markdown setting: explicit value, or auto-on when any
    /// input names a .md file.
    pub fn markdown_enabled(&self) -> bool {
        self.markdown
            .unwrap_or_else(|| self.paths.iter().any(|p| p.ends_with(".md")))
    }
}

fn is_remote_path(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

impl fmt::Debug for CheckerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckerOptions")
            .field("paths", &self.paths)
            .field("concurrency", &self.concurrency)
            .field("recurse", &self.recurse)
            .field("timeout_ms", &self.timeout_ms)
            .field("links_to_skip", &self.links_to_skip)
            .field(
                "skip_predicate",
                &self.skip_predicate.as_ref().map(|_| "<async fn>"),
            )
            .field("markdown", &self.markdown)
            .field("server_root", &self.server_root)
            .field("directory_listing", &self.directory_listing)
            .field("port", &self.port)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CheckerOptions::new(vec!["https://test.local/".to_string()]);
        assert_eq!(options.concurrency, 100);
        assert!(!options.recurse);
        assert!(options.timeout_ms.is_none());
        assert!(!options.user_agent.is_empty());
    }

    #[test]
    fn test_input_kind_remote() {
        let options = CheckerOptions::new(vec![
            "https://test.local/".to_string(),
            "http://other.local/".to_string(),
        ]);
        assert_eq!(options.input_kind().unwrap(), InputKind::Remote);
    }

    #[test]
    fn test_input_kind_local() {
        let options = CheckerOptions::new(vec!["docs/**/*.html".to_string()]);
        assert_eq!(options.input_kind().unwrap(), InputKind::Local);
    }

    #[test]
    fn test_empty_paths_rejected() {
        let options = CheckerOptions::new(Vec::new());
        assert!(matches!(options.input_kind(), Err(ConfigError::EmptyPaths)));
    }

    #[test]
    fn test_mixed_inputs_rejected() {
        let options = CheckerOptions::new(vec![
            "https://test.local/".to_string(),
            "docs/index.html".to_string(),
        ]);
        assert!(matches!(
            options.input_kind(),
            Err(ConfigError::MixedInputs)
        ));
    }

    #[test]
    fn test_server_root_with_remote_rejected() {
        let mut options = CheckerOptions::new(vec!["https://test.local/".to_string()]);
        options.server_root = Some(PathBuf::from("./docs"));
        assert!(matches!(
            options.input_kind(),
            Err(ConfigError::ServerRootWithRemote)
        ));
    }

    #[test]
    fn test_markdown_auto_detection() {
        let options = CheckerOptions::new(vec!["README.md".to_string()]);
        assert!(options.markdown_enabled());

        let options = CheckerOptions::new(vec!["index.html".to_string()]);
        assert!(!options.markdown_enabled());

        let mut options = CheckerOptions::new(vec!["index.html".to_string()]);
        options.markdown = Some(true);
        assert!(options.markdown_enabled());
    }
}
