//! Outbound transport configuration.

use std::fmt;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Per-call timeout for orchestrator requests.
///
/// Twice the worker lease, leaving room for one internal retry.
pub const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(60);

/// Static basic-auth credentials for orchestrator calls.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create credentials from a username and password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    /// Build credentials only when both halves are configured.
    #[must_use]
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Option<Self> {
        match (username, password) {
            (Some(u), Some(p)) => Some(Self::new(u, p)),
            _ => None,
        }
    }

    /// The configured username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// `Basic base64(username:password)`.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where and how the transport reaches the orchestrator for one request.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct TransportConfig {
    /// Orchestrator base URL, without a trailing slash.
    pub base_url: String,
    pub timeout: Duration,
    pub credentials: Option<Credentials>,
}

impl TransportConfig {
    /// Target `base_url` with the standard timeout.
    #[must_use]
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout: TRANSPORT_TIMEOUT,
            credentials,
        }
    }

    /// Override the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The `Authorization` header value, if credentials are configured.
    #[must_use]
    pub fn authorization_header(&self) -> Option<String> {
        self.credentials.as_ref().map(Credentials::authorization_header)
    }
}
