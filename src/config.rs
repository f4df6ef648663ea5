use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::StorageError;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_FETCH_RETRIES: usize = 1;

/// Fixed key the bearer token is persisted under.
pub const TOKEN_KEY: &str = "authToken";

/// Trait for settings that can be read from an environment variable
pub trait FromEnv: Sized {
    /// The environment variable name for this setting
    const KEY_NAME: &'static str;

    /// Parse the raw variable value
    fn parse(raw: &str) -> Option<Self>;

    /// Find the setting by checking environment variables, after loading .env
    fn find() -> Option<Self> {
        // First try to load .env file (silently fail if not found)
        let _ = dotenvy::dotenv();

        let raw = env::var(Self::KEY_NAME).ok()?;
        let parsed = Self::parse(raw.trim());
        if parsed.is_none() {
            warn!(key = Self::KEY_NAME, value = %raw, "Ignoring unparseable environment value");
        }
        parsed
    }
}

pub struct ApiUrl(pub String);

impl FromEnv for ApiUrl {
    const KEY_NAME: &'static str = "QUESTIONMATE_API_URL";

    fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        Some(Self(raw.trim_end_matches('/').to_string()))
    }
}

pub struct TimeoutSecs(pub u64);

impl FromEnv for TimeoutSecs {
    const KEY_NAME: &'static str = "QUESTIONMATE_TIMEOUT_SECS";

    fn parse(raw: &str) -> Option<Self> {
        raw.parse().ok().filter(|secs| *secs > 0).map(Self)
    }
}

pub struct FetchRetries(pub usize);

impl FromEnv for FetchRetries {
    const KEY_NAME: &'static str = "QUESTIONMATE_FETCH_RETRIES";

    fn parse(raw: &str) -> Option<Self> {
        raw.parse().ok().map(Self)
    }
}

pub struct TokenPath(pub PathBuf);

impl FromEnv for TokenPath {
    const KEY_NAME: &'static str = "QUESTIONMATE_TOKEN_PATH";

    fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        Some(Self(PathBuf::from(raw)))
    }
}

/// Client-side settings for talking to the quiz backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    /// How many times a failed "more questions" fetch is retried before the quiz finishes.
    pub fetch_retries: usize,
    pub token_path: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            fetch_retries: DEFAULT_FETCH_RETRIES,
            token_path: None,
            output_dir: PathBuf::from("."),
        }
    }
}

impl ClientConfig {
    /// Build a config from `.env` and the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let config = Self {
            base_url: ApiUrl::find().map(|u| u.0).unwrap_or(defaults.base_url),
            request_timeout: TimeoutSecs::find()
                .map(|t| Duration::from_secs(t.0))
                .unwrap_or(defaults.request_timeout),
            fetch_retries: FetchRetries::find().map(|r| r.0).unwrap_or(defaults.fetch_retries),
            token_path: TokenPath::find().map(|p| p.0),
            output_dir: defaults.output_dir,
        };
        debug!(base_url = %config.base_url, timeout_secs = config.request_timeout.as_secs(), "Loaded client config");
        config
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Full URL for an API path such as `/users/login`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Where the bearer token lives on disk.
    pub fn resolve_token_path(&self) -> Result<PathBuf, StorageError> {
        if let Some(path) = &self.token_path {
            return Ok(path.clone());
        }
        let base = dirs::data_dir().ok_or(StorageError::NoDataDir)?;
        Ok(base.join("questionmate").join(TOKEN_KEY))
    }
}
