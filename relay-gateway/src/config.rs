//! Process-wide gateway configuration, read once at start-up.

use std::time::Duration;

use relay_executor::Credentials;

use crate::error::GatewayError;

/// Default outer deadline for one task, covering every orchestrator call.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

/// Gateway configuration.
///
/// | Variable | Default |
/// |---|---|
/// | `RELAY_LISTEN_ADDR` | `0.0.0.0:8080` |
/// | `RELAY_USERNAME` / `RELAY_PASSWORD` | unset (no basic auth) |
/// | `RELAY_VERBOSE` | `false` |
/// | `RELAY_LISTENER_SCHEME` | `http` (empty disables the fallback) |
/// | `RELAY_DEADLINE_SECS` | `120` |
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct GatewayConfig {
    pub listen_addr: String,
    /// Basic-auth credentials for orchestrator calls.
    pub credentials: Option<Credentials>,
    pub verbose: bool,
    /// Scheme assumed when the request carries no `x-forwarded-proto`.
    pub listener_scheme: Option<String>,
    pub deadline: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_owned(),
            credentials: None,
            verbose: false,
            listener_scheme: Some("http".to_owned()),
            deadline: DEFAULT_DEADLINE,
        }
    }
}

impl GatewayConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`GatewayError::Config`] if a variable holds an invalid value.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    /// Returns [`GatewayError::Config`] if a variable holds an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GatewayError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let verbose = match get("RELAY_VERBOSE").as_deref().map(str::trim) {
            None | Some("0" | "false" | "no") => false,
            Some("1" | "true" | "yes") => true,
            Some(other) => {
                return Err(GatewayError::Config(format!(
                    "RELAY_VERBOSE: unexpected value {other:?}"
                )))
            }
        };

        let deadline = match get("RELAY_DEADLINE_SECS") {
            None => defaults.deadline,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) | Err(_) => {
                    return Err(GatewayError::Config(format!(
                        "RELAY_DEADLINE_SECS: expected a positive integer, got {raw:?}"
                    )))
                }
                Ok(secs) => Duration::from_secs(secs),
            },
        };

        let listener_scheme = match lookup("RELAY_LISTENER_SCHEME") {
            None => defaults.listener_scheme,
            Some(s) if s.trim().is_empty() => None,
            Some(s) => Some(s.trim().to_owned()),
        };

        Ok(Self {
            listen_addr: get("RELAY_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            credentials: Credentials::from_parts(get("RELAY_USERNAME"), get("RELAY_PASSWORD")),
            verbose,
            listener_scheme,
            deadline,
        })
    }

    /// Replace the credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Replace the listener scheme fallback.
    #[must_use]
    pub fn with_listener_scheme(mut self, scheme: Option<&str>) -> Self {
        self.listener_scheme = scheme.map(str::to_owned);
        self
    }

    /// Replace the outer deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}
