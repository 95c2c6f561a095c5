use crate::models::{FailureDetail, TransportKind};
use crate::url_utils;
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method};
use std::time::Duration;
use url::Url;

/// Browser-like User-Agent sent on every probe. Some origins answer
/// crawler UAs with 403s that a browser would never see.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("request timeout")]
    Timeout,

    #[error("connection refused - server not accepting connections")]
    ConnectionRefused,

    #[error("DNS resolution failed")]
    Dns,

    #[error("SSL/TLS error - certificate or encryption issue")]
    Tls,

    #[error("too many redirects")]
    RedirectLimit,

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl ProbeError {
    /// Convert reqwest::Error into ProbeError.
    fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return ProbeError::Timeout;
        }

        if error.is_redirect() {
            return ProbeError::RedirectLimit;
        }

        let error_msg_lower = error.to_string().to_lowercase();

        if error.is_connect() {
            if error_msg_lower.contains("connection refused") {
                return ProbeError::ConnectionRefused;
            }
            if error_msg_lower.contains("dns")
                || error_msg_lower.contains("name resolution")
                || error_msg_lower.contains("no such host")
            {
                return ProbeError::Dns;
            }
        }

        if error_msg_lower.contains("certificate")
            || error_msg_lower.contains("ssl")
            || error_msg_lower.contains("tls")
        {
            return ProbeError::Tls;
        }

        ProbeError::Network(error.to_string())
    }

    fn kind(&self) -> TransportKind {
        match self {
            ProbeError::Timeout => TransportKind::Timeout,
            ProbeError::ConnectionRefused => TransportKind::ConnectionRefused,
            ProbeError::Dns => TransportKind::Dns,
            ProbeError::Tls => TransportKind::Tls,
            ProbeError::RedirectLimit => TransportKind::RedirectLimit,
            ProbeError::Body(_) => TransportKind::Body,
            ProbeError::Network(_) | ProbeError::ClientBuild(_) => TransportKind::Network,
        }
    }

    pub fn into_detail(self) -> FailureDetail {
        FailureDetail::Transport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// One HTTP response as seen by the checker.
#[derive(Debug)]
pub struct ProbeResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// Present only when the probe was asked to read the body
    pub body: Option<String>,
}

impl ProbeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_html(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(url_utils::is_html_content_type)
            .unwrap_or(false)
    }

    pub fn retry_after(&self) -> Option<&str> {
        self.headers.get(RETRY_AFTER)?.to_str().ok()
    }
}

/// The result of running the full probe ladder against one URL.
///
/// `response` is the last response obtained, if any; `failures` collects
/// the transport errors of every rung that failed along the way. Non-2xx
/// statuses are data here, never errors.
#[derive(Debug)]
pub struct ProbeOutcome {
    pub response: Option<ProbeResponse>,
    pub failures: Vec<FailureDetail>,
}

#[derive(Debug, Clone)]
pub struct ProbeClient {
    client: Client,
}

impl ProbeClient {
    /// Build the shared HTTP client for a run. A timeout of None (or 0)
    /// leaves the client without a deadline.
    pub fn new(user_agent: &str, timeout_ms: Option<u64>) -> Result<Self, ProbeError> {
        let mut builder = Client::builder()
            .user_agent(user_agent)
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(ms) = timeout_ms {
            if ms > 0 {
                builder = builder.timeout(Duration::from_millis(ms));
            }
        }

        let client = builder
            .build()
            .map_err(|e| ProbeError::ClientBuild(e.to_string()))?;

        Ok(Self { client })
    }

    /// Probe one URL with the fallback ladder:
    ///
    /// 1. HEAD when the body is not wanted, GET when it is.
    /// 2. A 405 means the server rejects HEAD; retry as GET.
    /// 3. A transport error or non-2xx on a body-less probe gets one
    ///    last GET that buffers the body as text. Some servers mishandle
    ///    HEAD and streamed reads but answer a plain GET correctly.
    ///
    /// The ladder runs serially within this call; a URL never has two
    /// attempts in flight at once.
    pub async fn probe(&self, url: &Url, want_body: bool) -> ProbeOutcome {
        let mut failures = Vec::new();

        let first_method = if want_body { Method::GET } else { Method::HEAD };
        let mut response = match self.attempt(url, first_method, want_body).await {
            Ok(resp) => Some(resp),
            Err(err) => {
                failures.push(err.into_detail());
                None
            }
        };

        if response.as_ref().map(|r| r.status) == Some(405) {
            tracing::debug!(url = %url, "HEAD rejected with 405, retrying as GET");
            match self.attempt(url, Method::GET, want_body).await {
                Ok(resp) => response = Some(resp),
                Err(err) => failures.push(err.into_detail()),
            }
        }

        let settled = response.as_ref().map(ProbeResponse::is_success).unwrap_or(false);
        if !want_body && !settled {
            match self.attempt(url, Method::GET, true).await {
                Ok(resp) => response = Some(resp),
                Err(err) => failures.push(err.into_detail()),
            }
        }

        ProbeOutcome { response, failures }
    }

    /// One request. The body is buffered as text when asked for,
    /// otherwise drained so the connection can be reused.
    async fn attempt(
        &self,
        url: &Url,
        method: Method,
        read_body: bool,
    ) -> Result<ProbeResponse, ProbeError> {
        let response = self
            .client
            .request(method, url.clone())
            .send()
            .await
            .map_err(ProbeError::from_reqwest)?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();

        let body = if read_body {
            Some(
                response
                    .text()
                    .await
                    .map_err(|e| ProbeError::Body(e.to_string()))?,
            )
        } else {
            let _ = response.bytes().await;
            None
        };

        Ok(ProbeResponse {
            status,
            headers,
            body,
        })
    }
}
