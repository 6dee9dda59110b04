use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::contexts::Context;
use crate::error::KiraError;
use crate::lookup::{DEFAULT_LOOKUP_URL, LookupCredentials};

pub const CONFIG_FILE_NAME: &str = "kira-submit.json";
pub const PASSWORD_ENV: &str = "KIRA_SUBMIT_PASSWORD";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub context: Option<Context>,
    #[serde(default)]
    pub input_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub output_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub lookup: Option<LookupConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LookupConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LookupSettings {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl LookupSettings {
    /// Credentials are only available when both parts are set.
    pub fn credentials(&self) -> Option<LookupCredentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(LookupCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LOOKUP_URL.to_string(),
            username: None,
            password: std::env::var(PASSWORD_ENV).ok(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub context: Option<Context>,
    pub input_dir: Option<Utf8PathBuf>,
    pub output_dir: Option<Utf8PathBuf>,
    pub lookup: LookupSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE_NAME),
        };

        if path.is_none() && !config_path.exists() {
            return Err(KiraError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    /// Like [`ConfigLoader::resolve`], but a missing default config file
    /// yields the defaults.
    pub fn resolve_or_default(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        match Self::resolve(path) {
            Err(KiraError::MissingConfig) => Self::resolve_config(Config::default()),
            other => other,
        }
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(KiraError::ConfigParse(format!(
                "unsupported schema_version {schema_version}"
            )));
        }

        let defaults = LookupSettings::default();
        let lookup = match config.lookup {
            Some(lookup) => LookupSettings {
                base_url: lookup
                    .base_url
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.base_url),
                username: lookup.username,
                password: defaults.password,
            },
            None => defaults,
        };

        Ok(ResolvedConfig {
            schema_version,
            context: config.context,
            input_dir: config.input_dir,
            output_dir: config.output_dir,
            lookup,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.lookup.base_url, DEFAULT_LOOKUP_URL);
        assert!(resolved.context.is_none());
    }

    #[test]
    fn lookup_base_url_is_normalized() {
        let config = Config {
            lookup: Some(LookupConfig {
                base_url: Some("http://localhost:8080/refs/".to_string()),
                username: Some("Webin-1".to_string()),
            }),
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.lookup.base_url, "http://localhost:8080/refs");
        assert_eq!(resolved.lookup.username.as_deref(), Some("Webin-1"));
    }

    #[test]
    fn future_schema_version_is_rejected() {
        let config = Config {
            schema_version: Some(2),
            ..Config::default()
        };
        assert!(matches!(
            ConfigLoader::resolve_config(config),
            Err(KiraError::ConfigParse(_))
        ));
    }
}
