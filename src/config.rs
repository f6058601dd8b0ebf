use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Sokrates";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default log filter when RUST_LOG is not set.
pub fn default_log_filter() -> String {
    "info,sokrates=debug".to_string()
}

/// Get the application data directory
/// ~/Sokrates/ on all platforms (user-visible by design)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Sokrates")
}

/// Directory holding one transcript file per learner
pub fn transcripts_dir() -> PathBuf {
    app_data_dir().join("transcripts")
}

/// Path of the credential database
pub fn users_db_path() -> PathBuf {
    app_data_dir().join("users.db")
}

/// Runtime configuration read from the environment.
///
/// Only `OPENAI_API_KEY` is required; everything else has a default
/// matching a local single-user deployment.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub api_base_url: String,
    pub bind_addr: SocketAddr,
    pub max_output_tokens: u32,
    pub enable_web_search: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| ConfigError::MissingApiKey)?;
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        let model =
            std::env::var("SOKRATES_MODEL").unwrap_or_else(|_| "gpt-4.1".to_string());
        let api_base_url = std::env::var("SOKRATES_API_BASE")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());

        let bind_addr = std::env::var("SOKRATES_BIND")
            .unwrap_or_else(|_| "127.0.0.1:8572".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddr)?;

        let max_output_tokens = match std::env::var("SOKRATES_MAX_OUTPUT_TOKENS") {
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidNumber("SOKRATES_MAX_OUTPUT_TOKENS"))?,
            Err(_) => 800,
        };

        let enable_web_search = match std::env::var("SOKRATES_WEB_SEARCH") {
            Ok(v) => matches!(v.as_str(), "1" | "true" | "yes"),
            Err(_) => true,
        };

        Ok(Self {
            api_key,
            model,
            api_base_url,
            bind_addr,
            max_output_tokens,
            enable_web_search,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("SOKRATES_BIND is not a valid socket address")]
    InvalidBindAddr,
    #[error("{0} is not a valid number")]
    InvalidNumber(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("Sokrates"));
    }

    #[test]
    fn transcripts_dir_under_app_data() {
        let dir = transcripts_dir();
        assert!(dir.starts_with(app_data_dir()));
        assert!(dir.ends_with("transcripts"));
    }

    #[test]
    fn users_db_under_app_data() {
        let path = users_db_path();
        assert!(path.starts_with(app_data_dir()));
        assert!(path.ends_with("users.db"));
    }

    #[test]
    fn app_name_is_sokrates() {
        assert_eq!(APP_NAME, "Sokrates");
    }
}
