use crate::config::CheckerOptions;
use crate::probe;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// linkscout cli
#[derive(Parser)]
#[command(name = "linkscout")]
#[command(about = "A concurrent broken-link checker for websites and local docs")]
#[command(version)]
pub struct Cli {
    /// Starting URLs, or filesystem paths/globs served via a local server
    #[arg(required = true, help = "URLs to check, or local paths/globs")]
    pub paths: Vec<String>,

    /// max parallel probes
    #[arg(
        short,
        long,
        default_value_t = CheckerOptions::DEFAULT_CONCURRENCY,
        help = "Maximum number of requests in flight at once"
    )]
    pub concurrency: usize,

    /// follow same-origin links
    #[arg(
        short,
        long,
        help = "Recurse into pages under the starting URL on the same host"
    )]
    pub recurse: bool,

    /// request timeout
    #[arg(long, help = "Per-request timeout in milliseconds (0 = none)")]
    pub timeout: Option<u64>,

    /// skip patterns
    #[arg(
        short,
        long = "skip",
        help = "Regex; matching URLs are reported as skipped (repeatable)"
    )]
    pub skip: Vec<String>,

    /// serve .md as html
    #[arg(long, help = "Convert Markdown to HTML when serving local files")]
    pub markdown: bool,

    /// local server root
    #[arg(long, help = "Root directory for the local server (local paths only)")]
    pub server_root: Option<PathBuf>,

    /// local server directory indexes
    #[arg(long, help = "Let the local server list directories")]
    pub directory_listing: bool,

    /// local server port
    #[arg(short, long, help = "Port for the local server (default: random in 5000-6000)")]
    pub port: Option<u16>,

    /// request user agent
    #[arg(
        short,
        long,
        default_value = probe::DEFAULT_USER_AGENT,
        help = "User agent string for requests"
    )]
    pub user_agent: String,

    /// output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, help = "Result output format")]
    pub format: OutputFormat,

    /// log file directory
    #[arg(long, help = "Also write logs to daily-rotated files in this directory")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    /// parse args
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Translate CLI flags into the effective option set.
    pub fn to_options(&self) -> CheckerOptions {
        let mut options = CheckerOptions::new(self.paths.clone());
        options.concurrency = self.concurrency;
        options.recurse = self.recurse;
        options.timeout_ms = self.timeout.filter(|&ms| ms > 0);
        options.links_to_skip = self.skip.clone();
        if self.markdown {
            options.markdown = Some(true);
        }
        options.server_root = self.server_root.clone();
        options.directory_listing = self.directory_listing;
        options.port = self.port;
        options.user_agent = self.user_agent.clone();
        options
    }
}
