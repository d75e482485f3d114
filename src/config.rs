use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://apis.ccbp.in";
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Runtime settings for the client.
///
/// Built from defaults, then environment variables, then CLI flags
/// (see `main.rs`), each layer overriding the previous one.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the job-board API, without a trailing slash
    pub api_url: String,
    /// Quiet period before a typed search term is applied
    pub debounce: Duration,
    /// Per-request timeout for API calls
    pub request_timeout: Duration,
    /// Directory holding the session database and the TUI log file
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            data_dir: default_data_dir(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_vars(|key| env::var(key).ok())
    }

    /// Apply overrides from a variable lookup. Split out from `from_env` so
    /// tests don't have to touch the process environment.
    pub fn with_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("JOBBY_API_URL") {
            self = self.with_api_url(&url);
        }
        if let Some(raw) = lookup("JOBBY_DEBOUNCE_MS") {
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => self.debounce = Duration::from_millis(ms),
                _ => tracing::warn!(value = %raw, "Ignoring invalid JOBBY_DEBOUNCE_MS"),
            }
        }
        if let Some(raw) = lookup("JOBBY_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %raw, "Ignoring invalid JOBBY_TIMEOUT_SECS"),
            }
        }
        if let Some(dir) = lookup("JOBBY_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("jobby.db")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("jobby.log")
    }
}

fn default_data_dir() -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobby") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        PathBuf::from(".")
    }
}
