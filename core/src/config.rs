//! Client configuration.

use std::fmt;
use std::time::Duration;

pub const LIVE_URL: &str = "https://sendparcel.poslaju.com.my/apiv1/";
pub const DEMO_URL: &str = "http://sendparcel-test.ap-southeast-1.elasticbeanstalk.com/apiv1/";

/// The two hosted SendParcel deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Live,
    Demo,
}

impl Environment {
    pub fn base_url(self) -> &'static str {
        match self {
            Environment::Live => LIVE_URL,
            Environment::Demo => DEMO_URL,
        }
    }
}

/// Credentials and transport settings for a `SendParcelClient`.
///
/// `api_secret` is kept but never sent: the API authenticates with the key
/// alone.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_key: String,
    pub api_secret: String,
    /// Prefix every remote action name is appended to. Must end with `/`.
    pub base_url: String,
    pub verify_tls: bool,
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            base_url: LIVE_URL.to_string(),
            verify_tls: true,
            timeout: None,
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.base_url = environment.base_url().to_string();
        self
    }

    /// Point at an arbitrary deployment, such as a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("verify_tls", &self.verify_tls)
            .field("timeout", &self.timeout)
            .finish()
    }
}
