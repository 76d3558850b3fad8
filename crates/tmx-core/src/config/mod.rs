//! Client configuration loaded from the environment.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::util::normalize_email;

const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
const POLL_INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 250..=60_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which client variant is running; decides the note list filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Platform {
    #[default]
    Desktop,
    Mobile,
}

impl Platform {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(Self::Desktop),
            "mobile" => Ok(Self::Mobile),
            other => Err(ConfigError::Invalid(format!(
                "TMX_PLATFORM must be desktop or mobile, got {other:?}"
            ))),
        }
    }
}

/// Firebase web app credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub app_id: String,
    pub storage_bucket: Option<String>,
    pub messaging_sender_id: Option<String>,
}

impl fmt::Debug for FirebaseConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FirebaseConfig")
            .field("api_key", &"[REDACTED]")
            .field("auth_domain", &self.auth_domain)
            .field("project_id", &self.project_id)
            .field("app_id", &self.app_id)
            .field("storage_bucket", &self.storage_bucket)
            .field("messaging_sender_id", &self.messaging_sender_id)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub firebase: FirebaseConfig,
    /// Normalized superadmin address
    pub superadmin_email: String,
    pub platform: Platform,
    pub poll_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    /// Build from any key lookup. Every missing required key is reported
    /// in a single error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut required = |name: &'static str| {
            let value = optional_trimmed(&lookup, name);
            if value.is_none() {
                missing.push(name);
            }
            value.unwrap_or_default()
        };

        let api_key = required("FIREBASE_API_KEY");
        let auth_domain = required("FIREBASE_AUTH_DOMAIN");
        let project_id = required("FIREBASE_PROJECT_ID");
        let app_id = required("FIREBASE_APP_ID");
        let superadmin_email = required("SUPERADMIN_EMAIL");

        if !missing.is_empty() {
            return Err(ConfigError::MissingFields(missing));
        }

        let platform = optional_trimmed(&lookup, "TMX_PLATFORM")
            .map(|value| value.parse::<Platform>())
            .transpose()?
            .unwrap_or_default();

        let poll_interval_ms = optional_trimmed(&lookup, "TMX_POLL_INTERVAL_MS")
            .map_or(Ok(DEFAULT_POLL_INTERVAL_MS), |value| value.parse::<u64>())
            .map_err(|_| {
                ConfigError::Invalid(
                    "TMX_POLL_INTERVAL_MS must be an integer in [250, 60000]".to_string(),
                )
            })?;
        if !POLL_INTERVAL_RANGE_MS.contains(&poll_interval_ms) {
            return Err(ConfigError::Invalid(
                "TMX_POLL_INTERVAL_MS must be in [250, 60000]".to_string(),
            ));
        }

        Ok(Self {
            firebase: FirebaseConfig {
                api_key,
                auth_domain,
                project_id,
                app_id,
                storage_bucket: optional_trimmed(&lookup, "FIREBASE_STORAGE_BUCKET"),
                messaging_sender_id: optional_trimmed(&lookup, "FIREBASE_MESSAGING_SENDER_ID"),
            },
            superadmin_email: normalize_email(&superadmin_email),
            platform,
            poll_interval: Duration::from_millis(poll_interval_ms),
        })
    }
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    crate::util::normalize_text_option(lookup(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn complete() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("FIREBASE_API_KEY", "sensitive-api-key"),
            ("FIREBASE_AUTH_DOMAIN", "tmx.firebaseapp.com"),
            ("FIREBASE_PROJECT_ID", "tmx"),
            ("FIREBASE_APP_ID", "1:123:web:abc"),
            ("SUPERADMIN_EMAIL", " Boss@Example.com "),
        ])
    }

    fn load(map: &HashMap<&str, &str>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_reports_every_missing_field() {
        let mut map = complete();
        map.remove("FIREBASE_API_KEY");
        map.insert("FIREBASE_APP_ID", "   ");
        map.remove("SUPERADMIN_EMAIL");

        let error = load(&map).unwrap_err();
        assert_eq!(
            error,
            ConfigError::MissingFields(vec![
                "FIREBASE_API_KEY",
                "FIREBASE_APP_ID",
                "SUPERADMIN_EMAIL"
            ])
        );
        assert_eq!(
            error.to_string(),
            "Missing required environment variables: FIREBASE_API_KEY, FIREBASE_APP_ID, SUPERADMIN_EMAIL"
        );
    }

    #[test]
    fn config_applies_defaults() {
        let config = load(&complete()).unwrap();
        assert_eq!(config.platform, Platform::Desktop);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.superadmin_email, "boss@example.com");
        assert_eq!(config.firebase.storage_bucket, None);
    }

    #[test]
    fn config_reads_optional_values() {
        let mut map = complete();
        map.insert("TMX_PLATFORM", "Mobile");
        map.insert("TMX_POLL_INTERVAL_MS", "500");
        map.insert("FIREBASE_STORAGE_BUCKET", "tmx.appspot.com");

        let config = load(&map).unwrap();
        assert_eq!(config.platform, Platform::Mobile);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(
            config.firebase.storage_bucket.as_deref(),
            Some("tmx.appspot.com")
        );
    }

    #[test]
    fn config_rejects_invalid_values() {
        let mut map = complete();
        map.insert("TMX_PLATFORM", "watch");
        assert!(matches!(load(&map), Err(ConfigError::Invalid(_))));

        let mut map = complete();
        map.insert("TMX_POLL_INTERVAL_MS", "10");
        assert!(matches!(load(&map), Err(ConfigError::Invalid(_))));

        map.insert("TMX_POLL_INTERVAL_MS", "soon");
        assert!(matches!(load(&map), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn config_redacts_api_key() {
        let config = load(&complete()).unwrap();
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("sensitive-api-key"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
