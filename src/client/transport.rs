//! The HTTP seam the fetcher sends requests through

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use url::Url;

/// Status and raw body of one HTTP exchange
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failures where no HTTP response was produced
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid endpoint '{endpoint}': {source}")]
    InvalidUrl {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Performs a single HTTP GET
///
/// Non-success statuses are returned as responses, not errors; deciding what
/// to retry is the fetcher's job.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        endpoint: &str,
        headers: &HeaderMap,
        verify: bool,
    ) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by reqwest
///
/// Holds one client that verifies TLS certificates and one that does not, so
/// `verify` can be chosen per request.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    strict: Client,
    insecure: Client,
}

impl ReqwestTransport {
    pub fn try_new() -> Result<Self, TransportError> {
        Ok(Self {
            strict: Client::builder().build()?,
            insecure: Client::builder().danger_accept_invalid_certs(true).build()?,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        endpoint: &str,
        headers: &HeaderMap,
        verify: bool,
    ) -> Result<HttpResponse, TransportError> {
        let url = Url::parse(endpoint).map_err(|source| TransportError::InvalidUrl {
            endpoint: endpoint.to_string(),
            source,
        })?;
        let client = match verify {
            true => &self.strict,
            false => &self.insecure,
        };

        let response = client.get(url).headers(headers.clone()).send().await?;
        let status = response.status().as_u16();
        log::trace!("GET {} -> {}", endpoint, status);
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}
