//! linkscout: a concurrent broken-link checker.
//!
//! Feeds starting URLs (or local files behind a loopback server) through
//! a bounded-concurrency probe queue, deduplicates discovered links,
//! backs off per host on 429 responses, and reports every link as OK,
//! BROKEN, or SKIPPED.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod delay_cache;
pub mod events;
pub mod extractor;
pub mod logging;
pub mod models;
pub mod probe;
pub mod queue;
pub mod server_bridge;
pub mod skip;
pub mod url_utils;
pub mod visit_cache;

// Re-export main types for library usage
pub use config::{CheckerOptions, ConfigError, InputKind, SkipPredicate};
pub use coordinator::{check, LinkChecker};
pub use events::CrawlEvent;
pub use extractor::{extract_links, ExtractedLink};
pub use models::{CheckSummary, CrawlTask, FailureDetail, LinkResult, LinkState, TransportKind};
pub use probe::{ProbeClient, ProbeError};
pub use queue::WorkQueue;
