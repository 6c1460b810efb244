//! Client configuration.

use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use payos::config::{Credentials, ENV_BASE_URL};
use payos::retry::RetryPolicy;
use payos::signature::HashAlgorithm;
use reqwest_middleware as rqm;

use crate::constants::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use crate::middleware::DebugLogger;

/// Configuration for [`crate::PayOsClient`].
///
/// Unset credentials and base URL fall back to the `PAYOS_*` environment
/// variables when the client is built.
#[derive(Clone, Default)]
pub struct ClientOptions {
    credentials: Credentials,
    base_url: Option<String>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    retry_policy: Option<RetryPolicy>,
    algorithm: HashAlgorithm,
    http_client: Option<reqwest::Client>,
    middlewares: Vec<Arc<dyn rqm::Middleware>>,
    debug: Option<DebugLogger>,
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_policy", &self.retry_policy)
            .field("algorithm", &self.algorithm)
            .field("middlewares", &self.middlewares.len())
            .field("debug", &self.debug.is_some())
            .finish_non_exhaustive()
    }
}

impl ClientOptions {
    /// Empty options; everything comes from the environment or defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets all credentials at once.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets the client id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.credentials.client_id = client_id.into();
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.credentials.api_key = api_key.into();
        self
    }

    /// Sets the checksum key.
    #[must_use]
    pub fn with_checksum_key(mut self, checksum_key: impl Into<String>) -> Self {
        self.credentials.checksum_key = checksum_key.into();
        self
    }

    /// Sets the partner code.
    #[must_use]
    pub fn with_partner_code(mut self, partner_code: impl Into<String>) -> Self {
        self.credentials.partner_code = Some(partner_code.into());
        self
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the number of retries after the first attempt. `0` disables
    /// retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Replaces the whole retry policy. [`Self::with_max_retries`] still
    /// overrides its budget.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Selects the HMAC hash. Every payOS endpoint uses SHA-256.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Uses a pre-built HTTP client.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Appends a middleware. Earlier middlewares wrap later ones.
    #[must_use]
    pub fn with_middleware<M: rqm::Middleware>(self, middleware: M) -> Self {
        self.with_middleware_arc(Arc::new(middleware))
    }

    /// Appends a shared middleware.
    #[must_use]
    pub fn with_middleware_arc(mut self, middleware: Arc<dyn rqm::Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Enables request/response dumps through `tracing`.
    #[must_use]
    pub fn with_debug(self) -> Self {
        self.with_debug_logger(DebugLogger::new())
    }

    /// Enables request/response dumps through a custom logger.
    #[must_use]
    pub fn with_debug_logger(mut self, logger: DebugLogger) -> Self {
        self.debug = Some(logger);
        self
    }

    pub(crate) fn resolved_credentials(&self) -> Credentials {
        self.credentials.clone().resolve()
    }

    pub(crate) fn resolved_base_url(&self) -> String {
        self.base_url
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| env::var(ENV_BASE_URL).ok().filter(|u| !u.is_empty()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned())
    }

    pub(crate) fn resolved_timeout(&self) -> Duration {
        self.timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub(crate) fn resolved_retry_policy(&self) -> RetryPolicy {
        let policy = self.retry_policy.unwrap_or_default();
        match self.max_retries {
            Some(max_retries) => policy.with_max_retries(max_retries),
            None => policy,
        }
    }

    pub(crate) const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Wraps the HTTP client in the middleware chain. The debug logger, if
    /// any, is the outermost layer.
    pub(crate) fn build_http_client(&self) -> rqm::ClientWithMiddleware {
        let client = self.http_client.clone().unwrap_or_default();
        let mut builder = rqm::ClientBuilder::new(client);
        if let Some(debug) = &self.debug {
            builder = builder.with(debug.clone());
        }
        for middleware in &self.middlewares {
            builder = builder.with_arc(Arc::clone(middleware));
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ClientOptions::new().with_base_url("http://localhost:1");
        assert_eq!(options.resolved_timeout(), DEFAULT_TIMEOUT);
        assert_eq!(options.resolved_retry_policy().max_retries(), 2);
        assert_eq!(options.resolved_base_url(), "http://localhost:1");
    }

    #[test]
    fn test_max_retries_overrides_policy() {
        let options = ClientOptions::new()
            .with_retry_policy(RetryPolicy::new(5).with_initial_delay(Duration::from_millis(1)))
            .with_max_retries(0);
        let policy = options.resolved_retry_policy();
        assert_eq!(policy.max_retries(), 0);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_zero_timeout_means_default() {
        let options = ClientOptions::new().with_timeout(Duration::ZERO);
        assert_eq!(options.resolved_timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_debug_hides_secrets() {
        let options = ClientOptions::new()
            .with_client_id("id")
            .with_api_key("api-secret")
            .with_checksum_key("checksum-secret");
        let rendered = format!("{options:?}");
        assert!(rendered.contains("id"));
        assert!(!rendered.contains("api-secret"));
        assert!(!rendered.contains("checksum-secret"));
    }
}
