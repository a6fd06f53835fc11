//! HTTP access for the API source.
//!
//! This module provides the [`RetryingFetcher`] used by the API strategy,
//! the [`Transport`] seam it sends requests through ([`ReqwestTransport`] in
//! production), and request authentication ([`Auth`], [`AuthType`]).

mod auth;
mod fetcher;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{Auth, AuthType};
pub use fetcher::{AttemptError, FetchError, RetryPolicy, RetryingFetcher};
pub use transport::{HttpResponse, ReqwestTransport, Transport, TransportError};
