//! HTTP GET with bounded, constant-backoff retries

use super::{Transport, TransportError};
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Why a single attempt failed
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("malformed JSON body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Every attempt failed; carries the last failure
    #[error("Endpoint request to {endpoint} failed after {attempts} attempt(s): {last}")]
    Exhausted {
        endpoint: String,
        attempts: u32,
        #[source]
        last: AttemptError,
    },

    #[error("Fetching {endpoint} exceeded the {deadline:?} deadline")]
    DeadlineExceeded { endpoint: String, deadline: Duration },
}

/// Retry budget for one fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`
    pub max_retries: u32,
    /// Constant sleep between attempts
    pub backoff: Duration,
    /// Upper bound for the whole fetch, sleeps included
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: Duration::from_secs(60),
            deadline: None,
        }
    }
}

/// Per-call bookkeeping, dropped when the fetch returns
struct RetryState {
    attempts: u32,
    attempts_remaining: u32,
    backoff: Duration,
}

impl RetryState {
    fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempts: 0,
            attempts_remaining: policy.max_retries,
            backoff: policy.backoff,
        }
    }
}

/// Fetches JSON payloads, retrying transport failures, non-2xx statuses and
/// malformed bodies
///
/// # Example
/// ```no_run
/// use tabextract::client::{RetryPolicy, RetryingFetcher};
/// use std::time::Duration;
///
/// # async fn example() -> eyre::Result<()> {
/// let fetcher = RetryingFetcher::try_new()?.with_policy(RetryPolicy {
///     max_retries: 2,
///     backoff: Duration::from_secs(5),
///     deadline: None,
/// });
/// let payload = fetcher.fetch("https://example.com/positions").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RetryingFetcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    headers: HeaderMap,
    verify: bool,
}

impl RetryingFetcher {
    /// Fetcher over reqwest with default policy, no headers and no TLS verification
    pub fn try_new() -> Result<Self, TransportError> {
        Ok(Self::with_transport(Arc::new(super::ReqwestTransport::try_new()?)))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
            headers: HeaderMap::new(),
            verify: false,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GET `endpoint` and decode its JSON body
    ///
    /// Returns `Ok(None)` when a successful response carried an empty body.
    ///
    /// # Errors
    /// [`FetchError::Exhausted`] once `max_retries + 1` attempts have failed,
    /// [`FetchError::DeadlineExceeded`] if the policy deadline elapses first.
    pub async fn fetch(&self, endpoint: &str) -> Result<Option<Value>, FetchError> {
        log::info!("Making get request for endpoint {}", endpoint);
        match self.policy.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.fetch_with_retries(endpoint))
                .await
                .map_err(|_| {
                    log::error!("Endpoint request to {} timed out", endpoint);
                    FetchError::DeadlineExceeded {
                        endpoint: endpoint.to_string(),
                        deadline,
                    }
                })?,
            None => self.fetch_with_retries(endpoint).await,
        }
    }

    async fn fetch_with_retries(&self, endpoint: &str) -> Result<Option<Value>, FetchError> {
        let mut state = RetryState::new(&self.policy);
        loop {
            state.attempts += 1;
            match self.attempt(endpoint).await {
                Ok(payload) => return Ok(payload),
                Err(err) if state.attempts_remaining > 0 => {
                    state.attempts_remaining -= 1;
                    log::debug!("Attempt {} on {} failed: {}", state.attempts, endpoint, err);
                    tokio::time::sleep(state.backoff).await;
                    log::warn!("Retrying {}", endpoint);
                }
                Err(err) => {
                    log::error!("Endpoint request failed with exception: {}", err);
                    return Err(FetchError::Exhausted {
                        endpoint: endpoint.to_string(),
                        attempts: state.attempts,
                        last: err,
                    });
                }
            }
        }
    }

    async fn attempt(&self, endpoint: &str) -> Result<Option<Value>, AttemptError> {
        let response = self
            .transport
            .get(endpoint, &self.headers, self.verify)
            .await?;
        if !response.is_success() {
            return Err(AttemptError::Status {
                status: response.status,
            });
        }
        if response.body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&response.body)?))
    }
}
