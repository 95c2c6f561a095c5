use serde::Serialize;
use url::Url;

/// Outcome classification for a checked link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LinkState {
    /// The probe returned a 2xx status
    Ok,
    /// Non-2xx status, or no response at all (status 0)
    Broken,
    /// Excluded by scheme, predicate, or pattern; never probed
    Skipped,
}

impl LinkState {
    /// Classify an HTTP status code. Status 0 means "no response".
    pub fn from_status(status: u16) -> Self {
        if (200..300).contains(&status) {
            LinkState::Ok
        } else {
            LinkState::Broken
        }
    }
}

/// Transport-level failure classification for probe attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Timeout,
    ConnectionRefused,
    Dns,
    Tls,
    RedirectLimit,
    Network,
    Body,
}

/// One structured failure record attached to a LinkResult.
///
/// A result may accumulate several of these: every failed rung of the
/// probe ladder contributes one, and a terminal non-2xx response adds
/// its status summary.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureDetail {
    HttpStatus {
        status: u16,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Transport {
        kind: TransportKind,
        message: String,
    },
}

/// The outcome of checking one URL.
///
/// Results are append-only: once recorded they are never mutated. The
/// `url` field is a string rather than a parsed URL so that hrefs which
/// failed to resolve against their base can still be reported verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct LinkResult {
    pub url: String,

    /// HTTP status of the final probe attempt; 0 when no response arrived
    pub status: u16,

    pub state: LinkState,

    /// The page this link was discovered on, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failure_details: Vec<FailureDetail>,
}

impl LinkResult {
    /// Result for a URL excluded by the skip policy.
    pub fn skipped(url: &Url, parent: Option<&Url>) -> Self {
        Self {
            url: url.to_string(),
            status: 0,
            state: LinkState::Skipped,
            parent: parent.map(Url::to_string),
            failure_details: Vec::new(),
        }
    }

    /// Result for an href that could not be resolved against its base.
    pub fn unresolvable(original_href: String, parent: &Url) -> Self {
        Self {
            url: original_href,
            status: 0,
            state: LinkState::Broken,
            parent: Some(parent.to_string()),
            failure_details: Vec::new(),
        }
    }

    pub fn is_broken(&self) -> bool {
        self.state == LinkState::Broken
    }
}

/// A unit of crawl work. Tasks are plain owned data so that a deferred
/// retry (429 back-off) can re-enqueue the identical task by value.
#[derive(Debug, Clone)]
pub struct CrawlTask {
    pub url: Url,

    /// true: fetch the body and potentially recurse; false: reachability only
    pub crawl: bool,

    /// The page that linked here; None for starting URLs
    pub parent: Option<Url>,

    /// The original entry URL; recursion is gated on it
    pub root_path: Url,
}

impl CrawlTask {
    pub fn root(url: Url) -> Self {
        Self {
            root_path: url.clone(),
            url,
            crawl: true,
            parent: None,
        }
    }
}

/// Final report of one run.
#[derive(Debug, Clone, Serialize)]
pub struct CheckSummary {
    /// true iff no link came back BROKEN
    pub passed: bool,
    pub links: Vec<LinkResult>,
}

impl CheckSummary {
    pub fn from_results(links: Vec<LinkResult>) -> Self {
        Self {
            passed: !links.iter().any(LinkResult::is_broken),
            links,
        }
    }

    pub fn count(&self, state: LinkState) -> usize {
        self.links.iter().filter(|l| l.state == state).count()
    }
}
