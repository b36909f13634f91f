//! Public configuration for the HTTP adapters.

use std::time::Duration;

use ocm_core::SyncSettings;

/// Configuration shared by the content API client and the image transport.
///
/// Use the builder pattern methods to customize the configuration.
///
/// # Example
///
/// ```
/// use ocm_http::HttpClientConfig;
/// use std::time::Duration;
///
/// let config = HttpClientConfig::new()
///     .with_base_url("https://content.example.com/api")
///     .with_timeout(Duration::from_secs(10))
///     .with_user_agent("my-app/1.0");
/// ```
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL of the content API, without trailing slash
    pub(crate) base_url: String,
    /// User agent string for HTTP requests
    pub(crate) user_agent: String,
    /// Request timeout
    pub(crate) timeout: Duration,
    /// Optional bearer token
    pub(crate) token: Option<String>,
    /// Retries of a transient API failure, and extra attempts of an image transfer
    pub(crate) max_retries: u32,
    /// Base delay for exponential backoff
    pub(crate) retry_base_delay: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
            user_agent: concat!("ocm-http/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
            token: None,
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl HttpClientConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the configuration from the engine settings.
    ///
    /// `max_download_attempts` counts the first try, so it maps to one
    /// fewer retry.
    #[must_use]
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self::new()
            .with_base_url(settings.api_base_url.clone())
            .with_timeout(Duration::from_secs(settings.request_timeout_secs))
            .with_optional_token(settings.api_token.clone())
            .with_max_retries(settings.max_download_attempts.saturating_sub(1))
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    ///
    /// Defaults to 30 seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a bearer token sent with every API request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_optional_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Set the maximum number of retries for transient errors.
    ///
    /// Defaults to 2 retries (3 attempts).
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the base delay for exponential backoff.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Total tries of one image transfer.
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before retry number `retry` (1-based).
    pub(crate) fn backoff(&self, retry: u32) -> Duration {
        self.retry_base_delay
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }
}
