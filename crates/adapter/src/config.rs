//! Configuration resolution.
//!
//! All operating parameters come from named variables (process environment, optionally layered
//! over a `.env` file). A [`Configuration`] is either fully valid or not constructed at all.

use crate::error::{AdapterError, Result};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use unrelated_env::{EnvSource, LayeredEnv, ProcessEnv};
use unrelated_http_tools::{ClientOptions, PageLimits, RetryPolicy};
use url::Url;

pub const API_BASE_URL: &str = "API_BASE_URL";
pub const API_TOKEN: &str = "API_TOKEN";
pub const API_TIMEOUT_SECS: &str = "API_TIMEOUT_SECS";
pub const API_PAGE_SIZE: &str = "API_PAGE_SIZE";
pub const API_MAX_PAGES: &str = "API_MAX_PAGES";
pub const API_RETRY_MAX_ATTEMPTS: &str = "API_RETRY_MAX_ATTEMPTS";
pub const API_RETRY_INITIAL_INTERVAL_MS: &str = "API_RETRY_INITIAL_INTERVAL_MS";
pub const API_RETRY_BACKOFF_COEFFICIENT: &str = "API_RETRY_BACKOFF_COEFFICIENT";
pub const API_RETRY_MAX_INTERVAL_MS: &str = "API_RETRY_MAX_INTERVAL_MS";
pub const API_USER_AGENT: &str = "API_USER_AGENT";

/// Parameters without which the adapter cannot start.
pub const REQUIRED_PARAMETERS: [&str; 2] = [API_BASE_URL, API_TOKEN];

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 1000;
const DEFAULT_MAX_PAGES: u32 = 50;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_INITIAL_INTERVAL_MS: u64 = 200;
const DEFAULT_RETRY_BACKOFF_COEFFICIENT: f64 = 2.0;
const DEFAULT_RETRY_MAX_INTERVAL_MS: u64 = 5_000;

/// The API credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([redacted])")
    }
}

/// Resolved, immutable operating parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    /// Base URL of the external API, without a trailing `/`.
    pub endpoint: Url,
    pub credential: Credential,
    /// Per-request timeout; `None` when `API_TIMEOUT_SECS=0`.
    pub timeout: Option<Duration>,
    pub page_size: u32,
    pub max_pages: u32,
    pub retry: RetryPolicy,
    pub user_agent: String,
}

impl Configuration {
    /// Resolve from the process environment layered over `env_file` (if it exists).
    ///
    /// Process environment values take precedence over the file.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] naming the first missing or invalid parameter, or
    /// the override file if it cannot be parsed.
    pub fn resolve(env_file: Option<&Path>) -> Result<Self> {
        match env_file {
            Some(path) => {
                let env = LayeredEnv::with_override_file(ProcessEnv, path)?;
                Self::from_source(&env)
            }
            None => Self::from_source(&ProcessEnv),
        }
    }

    /// Resolve from an explicit source.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] naming the first missing or invalid parameter.
    pub fn from_source(env: &dyn EnvSource) -> Result<Self> {
        let endpoint = parse_endpoint(&required(env, API_BASE_URL)?)?;
        let credential = Credential(required(env, API_TOKEN)?);

        let timeout_secs = optional_parse(env, API_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS)?;
        let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        let page_size = optional_parse(env, API_PAGE_SIZE, DEFAULT_PAGE_SIZE)?;
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(AdapterError::configuration(format!(
                "{API_PAGE_SIZE} must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
            )));
        }
        let max_pages = optional_parse(env, API_MAX_PAGES, DEFAULT_MAX_PAGES)?;
        if max_pages == 0 {
            return Err(AdapterError::configuration(format!(
                "{API_MAX_PAGES} must be at least 1"
            )));
        }

        let retry = RetryPolicy {
            maximum_attempts: optional_parse(
                env,
                API_RETRY_MAX_ATTEMPTS,
                DEFAULT_RETRY_MAX_ATTEMPTS,
            )?,
            initial_interval_ms: optional_parse(
                env,
                API_RETRY_INITIAL_INTERVAL_MS,
                DEFAULT_RETRY_INITIAL_INTERVAL_MS,
            )?,
            backoff_coefficient: optional_parse(
                env,
                API_RETRY_BACKOFF_COEFFICIENT,
                DEFAULT_RETRY_BACKOFF_COEFFICIENT,
            )?,
            maximum_interval_ms: Some(optional_parse(
                env,
                API_RETRY_MAX_INTERVAL_MS,
                DEFAULT_RETRY_MAX_INTERVAL_MS,
            )?),
        };
        if retry.maximum_attempts == 0 {
            return Err(AdapterError::configuration(format!(
                "{API_RETRY_MAX_ATTEMPTS} must be at least 1"
            )));
        }
        if !retry.backoff_coefficient.is_finite() || retry.backoff_coefficient < 1.0 {
            return Err(AdapterError::configuration(format!(
                "{API_RETRY_BACKOFF_COEFFICIENT} must be a finite number >= 1.0"
            )));
        }

        let user_agent = env.non_empty(API_USER_AGENT).unwrap_or_else(|| {
            format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
        });

        Ok(Self {
            endpoint,
            credential,
            timeout,
            page_size,
            max_pages,
            retry,
            user_agent,
        })
    }

    /// Transport options derived from this configuration.
    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            base_url: self.endpoint.clone(),
            bearer_token: self.credential.expose().to_string(),
            timeout: self.timeout,
            user_agent: self.user_agent.clone(),
            retry: self.retry.clone(),
            page_limits: PageLimits {
                page_size: self.page_size,
                max_pages: self.max_pages,
            },
        }
    }
}

fn required(env: &dyn EnvSource, name: &str) -> Result<String> {
    env.non_empty(name)
        .ok_or_else(|| AdapterError::configuration(format!("{name} is required")))
}

fn optional_parse<T>(env: &dyn EnvSource, name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    let Some(raw) = env.non_empty(name) else {
        return Ok(default);
    };
    raw.parse().map_err(|_| {
        AdapterError::configuration(format!("{name} has an invalid value '{raw}'"))
    })
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).map_err(|e| {
        AdapterError::configuration(format!("{API_BASE_URL} is not a valid URL: {e}"))
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(AdapterError::configuration(format!(
            "{API_BASE_URL} must use http or https, got '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(AdapterError::configuration(format!(
            "{API_BASE_URL} must include a host"
        )));
    }

    let trimmed = url.path().trim_end_matches('/').to_string();
    url.set_path(&trimmed);
    url.set_fragment(None);
    Ok(url)
}
