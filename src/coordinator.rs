//! Crawl orchestration: gates, probing, result recording, and recursion.
//!
//! One `CrawlState` is shared by every task of a run. Tasks never fail
//! outward: anything that goes wrong while checking a URL is folded into
//! that URL's LinkResult, and only configuration problems abort a run
//! before the queue is populated.

use crate::config::{CheckerOptions, ConfigError, InputKind};
use crate::delay_cache::{self, DelayCache};
use crate::events::{CrawlEvent, EventBus};
use crate::extractor;
use crate::models::{CheckSummary, CrawlTask, FailureDetail, LinkResult, LinkState};
use crate::probe::ProbeClient;
use crate::queue::WorkQueue;
use crate::server_bridge::{self, ServerBridge};
use crate::skip::SkipPolicy;
use crate::url_utils;
use crate::visit_cache::VisitCache;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// One-shot convenience wrapper around [`LinkChecker`].
pub async fn check(options: CheckerOptions) -> Result<CheckSummary, ConfigError> {
    LinkChecker::new(options).check().await
}

pub struct LinkChecker {
    options: CheckerOptions,
    events: EventBus,
}

/// State shared by all tasks of one run. Created when the run starts and
/// dropped once the queue reaches idle.
struct CrawlState {
    probe: ProbeClient,
    skip: SkipPolicy,
    visits: VisitCache,
    delays: DelayCache,
    results: Mutex<Vec<LinkResult>>,
    events: EventBus,
    recurse: bool,
}

impl CrawlState {
    fn record(&self, result: LinkResult) {
        self.results.lock().push(result.clone());
        self.events.emit(CrawlEvent::Link(result));
    }
}

impl LinkChecker {
    pub fn new(options: CheckerOptions) -> Self {
        Self {
            options,
            events: EventBus::new(),
        }
    }

    /// Register an event subscriber. Subscribe before calling
    /// [`check`](Self::check); events are not replayed.
    pub fn subscribe(&self) -> flume::Receiver<CrawlEvent> {
        self.events.subscribe()
    }

    /// Run the check to completion and return the collected results.
    pub async fn check(&self) -> Result<CheckSummary, ConfigError> {
        let kind = self.options.input_kind()?;

        let skip = SkipPolicy::compile(
            &self.options.links_to_skip,
            self.options.skip_predicate.clone(),
        )?;
        let probe = ProbeClient::new(&self.options.user_agent, self.options.timeout_ms)?;

        let (roots, bridge) = self.resolve_roots(kind).await?;

        let state = Arc::new(CrawlState {
            probe,
            skip,
            visits: VisitCache::new(),
            delays: DelayCache::new(),
            results: Mutex::new(Vec::new()),
            events: self.events.clone(),
            recurse: self.options.recurse,
        });

        let queue = WorkQueue::new(self.options.concurrency);

        // Pre-insert starting URLs so a page linking back to a root does
        // not enqueue it a second time
        for root in roots {
            if state.visits.insert(root.as_str()) {
                queue.add(CrawlTask::root(root));
            }
        }

        let task_state = Arc::clone(&state);
        let task_queue = queue.clone();
        queue.start(move |task| {
            process_task(Arc::clone(&task_state), task_queue.clone(), task)
        });

        queue.on_idle().await;
        queue.close();

        if let Some(bridge) = bridge {
            bridge.shutdown();
        }

        let links = std::mem::take(&mut *state.results.lock());
        let summary = CheckSummary::from_results(links);
        tracing::info!(
            total = summary.links.len(),
            broken = summary.count(LinkState::Broken),
            skipped = summary.count(LinkState::Skipped),
            passed = summary.passed,
            "check finished"
        );
        Ok(summary)
    }

    /// Turn the configured inputs into starting URLs, spinning up the
    /// local bridge when they are filesystem paths.
    async fn resolve_roots(
        &self,
        kind: InputKind,
    ) -> Result<(Vec<Url>, Option<ServerBridge>), ConfigError> {
        match kind {
            InputKind::Remote => {
                let mut roots = Vec::new();
                for path in &self.options.paths {
                    let url = url_utils::parse_normalized(path).map_err(|source| {
                        ConfigError::InvalidStartUrl {
                            url: path.clone(),
                            source,
                        }
                    })?;
                    roots.push(url);
                }
                Ok((roots, None))
            }
            InputKind::Local => {
                let (root, relative) = server_bridge::resolve_local_inputs(
                    &self.options.paths,
                    self.options.server_root.as_deref(),
                )?;
                let bridge = ServerBridge::start(
                    root,
                    self.options.port,
                    self.options.markdown_enabled(),
                    self.options.directory_listing,
                )
                .await?;

                let mut roots = Vec::new();
                for path in &relative {
                    roots.push(bridge.url_for(path)?);
                }
                Ok((roots, Some(bridge)))
            }
        }
    }
}

/// Check one URL. This is the body of every queue task.
async fn process_task(state: Arc<CrawlState>, queue: WorkQueue<CrawlTask>, task: CrawlTask) {
    // Anything we cannot probe over HTTP is skipped, not broken
    if !url_utils::is_checkable_scheme(&task.url) {
        state.record(LinkResult::skipped(&task.url, task.parent.as_ref()));
        return;
    }

    if state.skip.should_skip(task.url.as_str()).await {
        state.record(LinkResult::skipped(&task.url, task.parent.as_ref()));
        return;
    }

    // Host still backing off from an earlier 429: requeue and yield
    let host = url_utils::extract_host(&task.url);
    if let Some(wait) = state.delays.remaining(&host) {
        tracing::debug!(url = %task.url, wait_ms = wait.as_millis() as u64, "host delayed, rescheduling");
        queue.add_delayed(task, wait);
        return;
    }

    let outcome = state.probe.probe(&task.url, task.crawl).await;

    // A 429 with a parseable Retry-After defers the task; no result is
    // recorded for this attempt
    if let Some(response) = &outcome.response {
        if response.status == 429 {
            if let Some(header) = response.retry_after() {
                let now = delay_cache::now_millis();
                if let Some(not_before) = delay_cache::parse_retry_after(header, now) {
                    state.delays.set(&host, not_before);
                    let wait = Duration::from_millis(not_before.saturating_sub(now));
                    tracing::debug!(url = %task.url, wait_ms = wait.as_millis() as u64, "rate limited, deferring");
                    queue.add_delayed(task, wait);
                    return;
                }
            }
        }
    }

    let mut failure_details = outcome.failures;
    let status = outcome.response.as_ref().map(|r| r.status).unwrap_or(0);
    let link_state = LinkState::from_status(status);
    if link_state == LinkState::Broken && status != 0 {
        failure_details.push(FailureDetail::HttpStatus {
            status,
            reason: reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .map(str::to_string),
        });
    }

    state.record(LinkResult {
        url: task.url.to_string(),
        status,
        state: link_state,
        parent: task.parent.as_ref().map(Url::to_string),
        failure_details,
    });

    let Some(response) = outcome.response else {
        return;
    };
    if !(task.crawl && state.recurse && response.is_html()) {
        return;
    }
    let Some(body) = response.body.as_deref() else {
        return;
    };

    state.events.emit(CrawlEvent::PageStart(task.url.clone()));
    tracing::debug!(url = %task.url, "extracting links");

    for link in extractor::extract_links(body, &task.url) {
        match link.url {
            // The href did not resolve against the page URL; that is a
            // broken link in its own right
            None => state.record(LinkResult::unresolvable(link.original_href, &task.url)),
            Some(child) => {
                let child_crawl = state.recurse && url_utils::is_under_root(&child, &task.root_path);
                if state.visits.insert(child.as_str()) {
                    queue.add(CrawlTask {
                        url: child,
                        crawl: child_crawl,
                        parent: Some(task.url.clone()),
                        root_path: task.root_path.clone(),
                    });
                }
            }
        }
    }
}
