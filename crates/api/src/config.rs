//! Process configuration, read once from `CAMPUSID_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use campusid_auth::SignerSettings;
use campusid_infra::DbConfig;
use campusid_observability::{LogConfig, LogFormat};

/// Upper bound for session tokens: one year.
pub const MAX_SESSION_TTL_SECS: i64 = 365 * 24 * 3600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Relay endpoint; when unset, mail is only logged.
    pub relay_url: Option<String>,
    pub sender: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database: DbConfig,
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub signer: SignerSettings,
    pub session_ttl: chrono::Duration,
    pub mail: MailConfig,
    pub link_base_url: String,
    pub institutional_domain: String,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (used by tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let bind_addr = parse_or(&get, "CAMPUSID_BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;

        let mut database = DbConfig::new(required("CAMPUSID_DATABASE_URL")?);
        database.max_connections = parse_or(&get, "CAMPUSID_DATABASE_MAX_CONNECTIONS", database.max_connections)?;

        let defaults = SignerSettings::default();
        let signer = SignerSettings {
            issuer: get("CAMPUSID_TOKEN_ISSUER").unwrap_or(defaults.issuer),
            audience: get("CAMPUSID_TOKEN_AUDIENCE").unwrap_or(defaults.audience),
        };

        let session_ttl_secs: i64 = parse_or(&get, "CAMPUSID_SESSION_TTL_SECS", 3600)?;
        if !(1..=MAX_SESSION_TTL_SECS).contains(&session_ttl_secs) {
            return Err(ConfigError::Invalid {
                key: "CAMPUSID_SESSION_TTL_SECS",
                message: format!("must be between 1 and {MAX_SESSION_TTL_SECS}"),
            });
        }
        let session_ttl = chrono::TimeDelta::try_seconds(session_ttl_secs).ok_or(ConfigError::Invalid {
            key: "CAMPUSID_SESSION_TTL_SECS",
            message: "out of range".to_string(),
        })?;

        let mail = MailConfig {
            relay_url: get("CAMPUSID_MAIL_RELAY_URL"),
            sender: get("CAMPUSID_MAIL_SENDER").unwrap_or_else(|| "noreply@auca.kg".to_string()),
            timeout: Duration::from_secs(parse_or(&get, "CAMPUSID_MAIL_TIMEOUT_SECS", 10)?),
        };

        let log = LogConfig {
            format: parse_or(&get, "CAMPUSID_LOG_FORMAT", LogFormat::Json)?,
            default_filter: get("CAMPUSID_LOG_FILTER").unwrap_or_else(|| "info".to_string()),
        };

        Ok(Self {
            bind_addr,
            database,
            private_key_path: required("CAMPUSID_PRIVATE_KEY_PATH")?.into(),
            public_key_path: required("CAMPUSID_PUBLIC_KEY_PATH")?.into(),
            signer,
            session_ttl,
            mail,
            link_base_url: get("CAMPUSID_LINK_BASE_URL").unwrap_or_else(|| "http://localhost:8080".to_string()),
            institutional_domain: get("CAMPUSID_INSTITUTIONAL_DOMAIN").unwrap_or_else(|| "auca.kg".to_string()),
            log,
        })
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("CAMPUSID_DATABASE_URL", "postgres://localhost/campusid"),
        ("CAMPUSID_PRIVATE_KEY_PATH", "/etc/campusid/auth_key.pem"),
        ("CAMPUSID_PUBLIC_KEY_PATH", "/etc/campusid/auth_key.pub"),
    ];

    #[test]
    fn defaults_fill_everything_optional() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.session_ttl, chrono::Duration::hours(1));
        assert_eq!(config.institutional_domain, "auca.kg");
        assert!(config.mail.relay_url.is_none());
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.signer, SignerSettings::default());
    }

    #[test]
    fn missing_database_url_is_reported() {
        let err = AppConfig::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("CAMPUSID_DATABASE_URL"));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("CAMPUSID_BIND_ADDR", "127.0.0.1:9000"),
            ("CAMPUSID_SESSION_TTL_SECS", "120"),
            ("CAMPUSID_LOG_FORMAT", "pretty"),
            ("CAMPUSID_MAIL_RELAY_URL", "http://relay.local/send"),
            ("CAMPUSID_TOKEN_AUDIENCE", "portal"),
        ]);
        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.session_ttl, chrono::Duration::minutes(2));
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert_eq!(config.mail.relay_url.as_deref(), Some("http://relay.local/send"));
        assert_eq!(config.signer.audience, "portal");
    }

    #[test]
    fn bad_numbers_are_invalid() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CAMPUSID_SESSION_TTL_SECS", "soon"));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "CAMPUSID_SESSION_TTL_SECS", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CAMPUSID_SESSION_TTL_SECS", "0"));
        assert!(AppConfig::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn oversized_session_ttl_is_rejected_at_load() {
        for raw in ["9000000000000", "9223372036854775807", "31536001"] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push(("CAMPUSID_SESSION_TTL_SECS", raw));
            assert!(
                matches!(
                    AppConfig::from_lookup(lookup(&pairs)),
                    Err(ConfigError::Invalid { key: "CAMPUSID_SESSION_TTL_SECS", .. })
                ),
                "{raw} was accepted"
            );
        }

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CAMPUSID_SESSION_TTL_SECS", "31536000"));
        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.session_ttl, chrono::Duration::days(365));
    }
}
