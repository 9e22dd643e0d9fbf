//! Runtime configuration read from the environment
use std::str::FromStr;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::normalize::NormalizerSettings;

pub const DEFAULT_APP_ID: &str = "default-app-id";
pub const DEFAULT_LOG_FILTER: &str = "info";
const APP_DIR: &str = "posing-library";
const IDENTITY_FILE: &str = "identity";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("Unable to determine a data directory, set POSING_DATA_DIR")]
    NoDataDir,
    #[error("Data directory is not valid UTF-8: {0:?}")]
    NonUtf8Path(std::path::PathBuf),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub app_id: String,
    pub data_dir: Utf8PathBuf,
    /// Token to sign in with, an anonymous identity is used without one.
    pub auth_token: Option<String>,
    pub log_filter: String,
    pub log_json: bool,
    pub normalizer: NormalizerSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from the values returned by `lookup`.
    ///
    /// Unset and blank values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = match get("POSING_DATA_DIR") {
            Some(dir) => Utf8PathBuf::from(dir),
            None => default_data_dir()?,
        };
        let database_url = get("POSING_DATABASE_URL")
            .unwrap_or_else(|| format!("sqlite://{}?mode=rwc", data_dir.join("posing_library.db")));

        let mut normalizer = NormalizerSettings::default();
        if let Some(value) = get("POSING_MAX_DIMENSION") {
            normalizer.max_dimension = parse("POSING_MAX_DIMENSION", value)?;
        }
        if let Some(value) = get("POSING_MAX_IMAGE_BYTES") {
            normalizer.max_size_bytes = parse("POSING_MAX_IMAGE_BYTES", value)?;
        }
        if normalizer.max_dimension == 0 {
            return Err(ConfigError::Invalid {
                key: "POSING_MAX_DIMENSION",
                value: String::from("0"),
            });
        }

        let log_json = match get("POSING_LOG_FORMAT").as_deref() {
            None | Some("pretty") => false,
            Some("json") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "POSING_LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            database_url,
            app_id: get("POSING_APP_ID").unwrap_or_else(|| DEFAULT_APP_ID.to_string()),
            data_dir,
            auth_token: get("POSING_AUTH_TOKEN"),
            log_filter: get("POSING_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            log_json,
            normalizer,
        })
    }

    /// Where the anonymous identity is kept between sessions.
    pub fn identity_file(&self) -> Utf8PathBuf {
        self.data_dir.join(IDENTITY_FILE)
    }
}

fn default_data_dir() -> Result<Utf8PathBuf, ConfigError> {
    let dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
    Utf8PathBuf::from_path_buf(dir)
        .map(|dir| dir.join(APP_DIR))
        .map_err(ConfigError::NonUtf8Path)
}

fn parse<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(values: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let values: HashMap<String, String> = values
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| values.get(key).cloned())
    }

    #[test]
    fn defaults_derive_from_data_dir() {
        let config = config(&[("POSING_DATA_DIR", "/srv/posing")]).unwrap();
        assert_eq!(config.app_id, DEFAULT_APP_ID);
        assert_eq!(
            config.database_url,
            "sqlite:///srv/posing/posing_library.db?mode=rwc"
        );
        assert_eq!(config.identity_file(), "/srv/posing/identity");
        assert_eq!(config.auth_token, None);
        assert_eq!(config.log_filter, "info");
        assert!(!config.log_json);
        assert_eq!(config.normalizer.max_dimension, 1600);
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("POSING_DATA_DIR", "/tmp/p"),
            ("POSING_DATABASE_URL", "sqlite::memory:"),
            ("POSING_APP_ID", "studio"),
            ("POSING_AUTH_TOKEN", "user-7.payload"),
            ("POSING_LOG", "debug"),
            ("POSING_LOG_FORMAT", "json"),
            ("POSING_MAX_DIMENSION", "800"),
            ("POSING_MAX_IMAGE_BYTES", "500000"),
        ])
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.app_id, "studio");
        assert_eq!(config.auth_token.as_deref(), Some("user-7.payload"));
        assert_eq!(config.log_filter, "debug");
        assert!(config.log_json);
        assert_eq!(config.normalizer.max_dimension, 800);
        assert_eq!(config.normalizer.max_size_bytes, 500_000);
    }

    #[test]
    fn reads_dotenv_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# studio laptop\nPOSING_DATA_DIR=/srv/posing\nPOSING_APP_ID=\"studio\"\nPOSING_LOG_FORMAT=json\n",
        )
        .unwrap();

        let values = dotenvy::from_path_iter(&path)
            .unwrap()
            .collect::<Result<HashMap<String, String>, _>>()
            .unwrap();
        let config = Config::from_lookup(|key| values.get(key).cloned()).unwrap();
        assert_eq!(config.data_dir, "/srv/posing");
        assert_eq!(config.app_id, "studio");
        assert!(config.log_json);
    }

    #[test]
    fn blank_token_is_unset() {
        let config = config(&[("POSING_DATA_DIR", "/tmp/p"), ("POSING_AUTH_TOKEN", "  ")]).unwrap();
        assert_eq!(config.auth_token, None);
    }

    #[test]
    fn rejects_invalid_numbers() {
        let result = config(&[("POSING_DATA_DIR", "/tmp/p"), ("POSING_MAX_DIMENSION", "big")]);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                key: "POSING_MAX_DIMENSION",
                ..
            })
        ));
        let result = config(&[("POSING_DATA_DIR", "/tmp/p"), ("POSING_MAX_DIMENSION", "0")]);
        assert!(result.is_err());
        let result = config(&[("POSING_DATA_DIR", "/tmp/p"), ("POSING_LOG_FORMAT", "xml")]);
        assert!(result.is_err());
    }
}
