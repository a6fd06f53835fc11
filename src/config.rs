//! Configuration loaded from environment variables

use crate::client::{Auth, RetryPolicy, RetryingFetcher};
use crate::extractor::UnknownSourcePolicy;
use crate::source::SourceRegistry;
use eyre::{Context, Result, eyre};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Settings shared by every extraction
#[derive(Clone, Debug)]
pub struct ExtractorConfig {
    pub retry: RetryPolicy,
    pub verify_tls: bool,
    pub connect_timeout: Option<Duration>,
    pub cache_dir: Option<PathBuf>,
    pub unknown_source: UnknownSourcePolicy,
    pub auth: Auth,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            verify_tls: false,
            connect_timeout: None,
            cache_dir: None,
            unknown_source: UnknownSourcePolicy::Empty,
            auth: Auth::None,
        }
    }
}

impl ExtractorConfig {
    /// Load configuration from environment variables
    ///
    /// Recognized variables (all optional):
    /// - TABX_MAX_RETRIES: fetch retries after the first attempt (default 5)
    /// - TABX_BACKOFF_SECS: sleep between fetch attempts (default 60)
    /// - TABX_FETCH_DEADLINE_SECS: deadline for a whole fetch
    /// - TABX_VERIFY_TLS: verify TLS certificates (default false)
    /// - TABX_CONNECT_TIMEOUT_SECS: deadline for acquiring a warehouse connection
    /// - TABX_CACHE_DIR: directory for cached results
    /// - TABX_UNKNOWN_SOURCE: `empty` or `reject` (default empty)
    /// - TABX_API_KEY, TABX_API_TOKEN, or TABX_API_USERNAME + TABX_API_PASSWORD
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let retry = RetryPolicy {
            max_retries: parse_var("TABX_MAX_RETRIES")?.unwrap_or(defaults.retry.max_retries),
            backoff: parse_var("TABX_BACKOFF_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry.backoff),
            deadline: parse_var("TABX_FETCH_DEADLINE_SECS")?.map(Duration::from_secs),
        };

        let auth = if let Some(apikey) = var("TABX_API_KEY") {
            Auth::Apikey(apikey)
        } else if let Some(token) = var("TABX_API_TOKEN") {
            Auth::Bearer(token)
        } else if let (Some(username), Some(password)) =
            (var("TABX_API_USERNAME"), var("TABX_API_PASSWORD"))
        {
            Auth::Basic(username, password)
        } else {
            Auth::None
        };

        let config = Self {
            retry,
            verify_tls: parse_flag("TABX_VERIFY_TLS")?.unwrap_or(defaults.verify_tls),
            connect_timeout: parse_var("TABX_CONNECT_TIMEOUT_SECS")?.map(Duration::from_secs),
            cache_dir: var("TABX_CACHE_DIR").map(PathBuf::from),
            unknown_source: parse_var("TABX_UNKNOWN_SOURCE")?.unwrap_or(defaults.unknown_source),
            auth,
        };
        log::debug!(
            "Loaded config: {} retries, {:?} backoff, auth {}",
            config.retry.max_retries,
            config.retry.backoff,
            config.auth
        );
        Ok(config)
    }

    /// Reqwest-backed fetcher carrying the retry policy, TLS setting and auth headers
    pub fn fetcher(&self) -> Result<RetryingFetcher> {
        let headers = self
            .auth
            .headers()
            .with_context(|| format!("Invalid {} credentials", self.auth))?;
        Ok(RetryingFetcher::try_new()
            .context("Failed to build HTTP client")?
            .with_policy(self.retry.clone())
            .with_headers(headers)
            .with_verify(self.verify_tls))
    }

    /// Registry with the API and file sources wired up
    pub fn registry(&self) -> Result<SourceRegistry> {
        Ok(SourceRegistry::new().with_api(self.fetcher()?).with_files())
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| eyre!("Invalid {}: '{}' ({})", name, raw, e))
        })
        .transpose()
}

fn parse_flag(name: &str) -> Result<Option<bool>> {
    var(name)
        .map(|raw| match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(eyre!("Invalid {}: '{}' (expected true or false)", name, raw)),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 11] = [
        "TABX_MAX_RETRIES",
        "TABX_BACKOFF_SECS",
        "TABX_FETCH_DEADLINE_SECS",
        "TABX_VERIFY_TLS",
        "TABX_CONNECT_TIMEOUT_SECS",
        "TABX_CACHE_DIR",
        "TABX_UNKNOWN_SOURCE",
        "TABX_API_KEY",
        "TABX_API_TOKEN",
        "TABX_API_USERNAME",
        "TABX_API_PASSWORD",
    ];

    fn clear_env() {
        for name in VARS {
            unsafe {
                std::env::remove_var(name);
            }
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_defaults() {
        clear_env();

        let config = ExtractorConfig::from_env().unwrap();
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(!config.verify_tls);
        assert!(config.cache_dir.is_none());
        assert_eq!(config.unknown_source, UnknownSourcePolicy::Empty);
        assert!(matches!(config.auth, Auth::None));
    }

    #[test]
    #[serial_test::serial]
    fn test_overrides() {
        clear_env();
        unsafe {
            std::env::set_var("TABX_MAX_RETRIES", "2");
            std::env::set_var("TABX_BACKOFF_SECS", "5");
            std::env::set_var("TABX_FETCH_DEADLINE_SECS", "30");
            std::env::set_var("TABX_VERIFY_TLS", "yes");
            std::env::set_var("TABX_CACHE_DIR", "/tmp/tabx");
            std::env::set_var("TABX_UNKNOWN_SOURCE", "reject");
            std::env::set_var("TABX_API_USERNAME", "svc");
            std::env::set_var("TABX_API_PASSWORD", "secret");
        }

        let config = ExtractorConfig::from_env().unwrap();
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.backoff, Duration::from_secs(5));
        assert_eq!(config.retry.deadline, Some(Duration::from_secs(30)));
        assert!(config.verify_tls);
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/tabx")));
        assert_eq!(config.unknown_source, UnknownSourcePolicy::Reject);
        assert!(matches!(config.auth, Auth::Basic(ref user, _) if user == "svc"));

        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn test_api_key_wins_over_basic() {
        clear_env();
        unsafe {
            std::env::set_var("TABX_API_KEY", "k1");
            std::env::set_var("TABX_API_USERNAME", "svc");
            std::env::set_var("TABX_API_PASSWORD", "secret");
        }

        let config = ExtractorConfig::from_env().unwrap();
        assert!(matches!(config.auth, Auth::Apikey(_)));

        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn test_invalid_values_name_the_variable() {
        clear_env();
        unsafe {
            std::env::set_var("TABX_MAX_RETRIES", "many");
        }
        let err = ExtractorConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("TABX_MAX_RETRIES"));

        clear_env();
        unsafe {
            std::env::set_var("TABX_VERIFY_TLS", "maybe");
        }
        let err = ExtractorConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("TABX_VERIFY_TLS"));

        clear_env();
    }

    #[test]
    fn test_registry_wires_api_and_files() {
        let registry = ExtractorConfig::default().registry().unwrap();
        assert_eq!(
            registry.kinds(),
            [crate::SourceKind::Api, crate::SourceKind::File]
        );
    }
}
