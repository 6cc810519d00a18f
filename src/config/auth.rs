use std::{env, fmt};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Duration;
use rand::RngCore;
use tracing::warn;

use crate::services::token_codec::DEFAULT_CLOCK_SKEW_SECONDS;

pub const MIN_PRODUCTION_SECRET_BYTES: usize = 32;

/// Upper bounds for the duration settings.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 24 * 60;
pub const MAX_SESSION_LIFETIME_DAYS: i64 = 366;
pub const MAX_CLOCK_SKEW_SECONDS: i64 = 60 * 60;

/// Prefix marking an `AUTH_SECRET` as base64 encoded.
const BASE64_SECRET_PREFIX: &str = "base64:";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("AUTH_SECRET must be set in production")]
    MissingSecret,
    #[error("AUTH_SECRET is too weak: {0}")]
    WeakSecret(&'static str),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Insecure production configuration: {0}")]
    InsecureProduction(String),
}

#[derive(Clone)]
pub struct AuthConfig {
    pub environment: String,
    pub secret: Vec<u8>,
    /// How long a magic link stays redeemable.
    pub token_ttl: Duration,
    pub session_lifetime: Duration,
    pub clock_skew: Duration,
    pub base_url: String,
    pub verify_path: String,
    pub cookie_name: String,
    /// Return the raw magic link to the caller in addition to emailing it.
    pub expose_magic_links: bool,
    pub app_name: String,
}

impl AuthConfig {
    /// Development defaults around an explicit secret.
    pub fn development(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            environment: "development".to_string(),
            secret: secret.into(),
            token_ttl: Duration::minutes(60),
            session_lifetime: Duration::days(7),
            clock_skew: Duration::seconds(DEFAULT_CLOCK_SKEW_SECONDS),
            base_url: "http://localhost:3000".to_string(),
            verify_path: "/auth/verify".to_string(),
            cookie_name: "session".to_string(),
            expose_magic_links: true,
            app_name: "Magic Auth".to_string(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let is_production = environment == "production";

        let secret = match env::var("AUTH_SECRET") {
            Ok(secret) if !secret.is_empty() => decode_secret_bytes(&secret)?,
            _ if is_production => return Err(ConfigError::MissingSecret),
            _ => {
                warn!("AUTH_SECRET not set; generating ephemeral secret (development only)");
                let mut bytes = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut bytes);
                bytes
            }
        };

        let expose_magic_links = match env::var("EXPOSE_MAGIC_LINKS") {
            Ok(value) => parse_flag("EXPOSE_MAGIC_LINKS", &value)?,
            Err(_) => !is_production,
        };

        Ok(Self {
            token_ttl: env_duration(
                "MAGIC_LINK_TTL_MINUTES",
                60,
                MAX_TOKEN_TTL_MINUTES,
                Duration::try_minutes,
            )?,
            session_lifetime: env_duration(
                "SESSION_LIFETIME_DAYS",
                7,
                MAX_SESSION_LIFETIME_DAYS,
                Duration::try_days,
            )?,
            clock_skew: env_duration(
                "CLOCK_SKEW_SECONDS",
                DEFAULT_CLOCK_SKEW_SECONDS,
                MAX_CLOCK_SKEW_SECONDS,
                Duration::try_seconds,
            )?,
            base_url: env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            verify_path: env::var("MAGIC_LINK_PATH").unwrap_or_else(|_| "/auth/verify".to_string()),
            cookie_name: env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "session".to_string()),
            app_name: env::var("APP_NAME").unwrap_or_else(|_| "Magic Auth".to_string()),
            expose_magic_links,
            secret,
            environment,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("environment", &self.environment)
            .field("secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("session_lifetime", &self.session_lifetime)
            .field("clock_skew", &self.clock_skew)
            .field("base_url", &self.base_url)
            .field("verify_path", &self.verify_path)
            .field("cookie_name", &self.cookie_name)
            .field("expose_magic_links", &self.expose_magic_links)
            .field("app_name", &self.app_name)
            .finish()
    }
}

/// Rejects settings that must never reach production.
pub fn validate_production_config(config: &AuthConfig) -> Result<(), ConfigError> {
    if !config.is_production() {
        return Ok(());
    }

    if config.secret.len() < MIN_PRODUCTION_SECRET_BYTES {
        return Err(ConfigError::WeakSecret(
            "must be at least 32 bytes (base64: secrets are measured after decoding)",
        ));
    }

    let lowered = String::from_utf8_lossy(&config.secret).to_ascii_lowercase();
    if lowered.contains("example") || lowered.contains("changeme") || lowered.contains("default") {
        return Err(ConfigError::WeakSecret("appears to be a placeholder value"));
    }

    if !config.base_url.starts_with("https://") {
        return Err(ConfigError::InsecureProduction(
            "BASE_URL must use https".to_string(),
        ));
    }

    if config.token_ttl <= Duration::zero() || config.session_lifetime <= Duration::zero() {
        return Err(ConfigError::InsecureProduction(
            "token and session lifetimes must be positive".to_string(),
        ));
    }

    check_upper_bound(
        "MAGIC_LINK_TTL_MINUTES",
        config.token_ttl,
        Duration::try_minutes(MAX_TOKEN_TTL_MINUTES),
    )?;
    check_upper_bound(
        "SESSION_LIFETIME_DAYS",
        config.session_lifetime,
        Duration::try_days(MAX_SESSION_LIFETIME_DAYS),
    )?;
    check_upper_bound(
        "CLOCK_SKEW_SECONDS",
        config.clock_skew,
        Duration::try_seconds(MAX_CLOCK_SKEW_SECONDS),
    )?;

    if config.expose_magic_links {
        warn!("EXPOSE_MAGIC_LINKS is enabled in production; login links will be returned to callers");
    }

    Ok(())
}

/// Reads a whole number of `unit`s from `key`, accepting `0..=max`.
fn env_duration(
    key: &'static str,
    default: i64,
    max: i64,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError> {
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|n| (0..=max).contains(n))
        .and_then(unit)
        .ok_or(ConfigError::InvalidValue { key, value })
}

fn check_upper_bound(
    key: &'static str,
    value: Duration,
    max: Option<Duration>,
) -> Result<(), ConfigError> {
    match max {
        Some(max) if value <= max => Ok(()),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

/// `base64:`-prefixed secrets are decoded; anything else is used as raw bytes.
fn decode_secret_bytes(secret: &str) -> Result<Vec<u8>, ConfigError> {
    match secret.strip_prefix(BASE64_SECRET_PREFIX) {
        Some(encoded) => STANDARD
            .decode(encoded.trim().as_bytes())
            .map_err(|_| ConfigError::InvalidValue {
                key: "AUTH_SECRET",
                value: format!("{}<invalid base64>", BASE64_SECRET_PREFIX),
            }),
        None => Ok(secret.as_bytes().to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_KEYS: [&str; 7] = [
        "ENVIRONMENT",
        "AUTH_SECRET",
        "MAGIC_LINK_TTL_MINUTES",
        "SESSION_LIFETIME_DAYS",
        "CLOCK_SKEW_SECONDS",
        "EXPOSE_MAGIC_LINKS",
        "BASE_URL",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            env::remove_var(key);
        }
    }

    fn production(secret: &[u8]) -> AuthConfig {
        AuthConfig {
            environment: "production".to_string(),
            base_url: "https://app.example.org".to_string(),
            expose_magic_links: false,
            ..AuthConfig::development(secret.to_vec())
        }
    }

    #[test]
    fn development_config_is_not_validated() {
        assert!(validate_production_config(&AuthConfig::development(b"x".to_vec())).is_ok());
    }

    #[test]
    fn production_accepts_strong_settings() {
        assert!(validate_production_config(&production(&[7u8; 48])).is_ok());
    }

    #[test]
    fn production_rejects_short_secret() {
        assert!(matches!(
            validate_production_config(&production(b"short")),
            Err(ConfigError::WeakSecret(_))
        ));
    }

    #[test]
    fn production_rejects_placeholder_secret() {
        let secret = b"changeme-changeme-changeme-changeme-changeme";
        assert!(matches!(
            validate_production_config(&production(secret)),
            Err(ConfigError::WeakSecret(_))
        ));
    }

    #[test]
    fn production_requires_https_base_url() {
        let config = AuthConfig {
            base_url: "http://app.example.org".to_string(),
            ..production(&[7u8; 48])
        };
        assert!(matches!(
            validate_production_config(&config),
            Err(ConfigError::InsecureProduction(_))
        ));
    }

    #[test]
    fn secrets_are_base64_decoded_only_with_prefix() {
        let encoded = format!("base64:{}", STANDARD.encode([1u8, 2, 3]));
        assert_eq!(decode_secret_bytes(&encoded).unwrap(), vec![1, 2, 3]);

        // Valid base64 without the prefix stays as written.
        assert_eq!(decode_secret_bytes("YWJjZA==").unwrap(), b"YWJjZA==".to_vec());
        assert_eq!(decode_secret_bytes("not base64!").unwrap(), b"not base64!".to_vec());

        assert!(matches!(
            decode_secret_bytes("base64:not base64!"),
            Err(ConfigError::InvalidValue { key: "AUTH_SECRET", .. })
        ));
    }

    #[test]
    fn production_rejects_durations_above_caps() {
        let config = AuthConfig {
            session_lifetime: Duration::days(MAX_SESSION_LIFETIME_DAYS + 1),
            ..production(&[7u8; 48])
        };
        assert!(matches!(
            validate_production_config(&config),
            Err(ConfigError::InvalidValue { key: "SESSION_LIFETIME_DAYS", .. })
        ));

        let config = AuthConfig {
            token_ttl: Duration::minutes(MAX_TOKEN_TTL_MINUTES + 1),
            ..production(&[7u8; 48])
        };
        assert!(matches!(
            validate_production_config(&config),
            Err(ConfigError::InvalidValue { key: "MAGIC_LINK_TTL_MINUTES", .. })
        ));

        let config = AuthConfig {
            session_lifetime: Duration::days(MAX_SESSION_LIFETIME_DAYS),
            token_ttl: Duration::minutes(MAX_TOKEN_TTL_MINUTES),
            clock_skew: Duration::seconds(MAX_CLOCK_SKEW_SECONDS),
            ..production(&[7u8; 48])
        };
        assert!(validate_production_config(&config).is_ok());
    }

    #[test]
    fn flags_parse_common_spellings() {
        assert!(parse_flag("X", "TRUE").unwrap());
        assert!(!parse_flag("X", "0").unwrap());
        assert!(parse_flag("X", "maybe").is_err());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let debug = format!("{:?}", AuthConfig::development(b"hunter2-hunter2".to_vec()));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    #[serial]
    fn from_env_reads_overrides() {
        clear_env();
        env::set_var("AUTH_SECRET", "plain-text-secret!");
        env::set_var("MAGIC_LINK_TTL_MINUTES", "15");
        env::set_var("BASE_URL", "https://auth.example.org/");

        let config = AuthConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.secret, b"plain-text-secret!".to_vec());
        assert_eq!(config.token_ttl, Duration::minutes(15));
        assert_eq!(config.base_url, "https://auth.example.org");
        assert!(config.expose_magic_links);
        assert!(!config.is_production());
    }

    #[test]
    #[serial]
    fn from_env_requires_secret_in_production() {
        clear_env();
        env::set_var("ENVIRONMENT", "production");

        let result = AuthConfig::from_env();
        clear_env();

        assert!(matches!(result, Err(ConfigError::MissingSecret)));
    }

    #[test]
    #[serial]
    fn from_env_rejects_bad_numbers() {
        clear_env();
        env::set_var("AUTH_SECRET", "plain-text-secret!");
        env::set_var("MAGIC_LINK_TTL_MINUTES", "soon");

        let result = AuthConfig::from_env();
        clear_env();

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    #[serial]
    fn from_env_rejects_durations_above_caps() {
        for (key, value) in [
            ("SESSION_LIFETIME_DAYS", "100000000"),
            ("SESSION_LIFETIME_DAYS", "200000000000"),
            ("MAGIC_LINK_TTL_MINUTES", "9223372036854775807"),
            ("CLOCK_SKEW_SECONDS", "3601"),
        ] {
            clear_env();
            env::set_var("AUTH_SECRET", "plain-text-secret!");
            env::set_var(key, value);

            let result = AuthConfig::from_env();
            clear_env();

            match result {
                Err(ConfigError::InvalidValue { key: rejected, .. }) => assert_eq!(rejected, key),
                other => panic!("expected {} to be rejected, got {:?}", key, other),
            }
        }
    }

    #[test]
    #[serial]
    fn from_env_accepts_durations_at_caps() {
        clear_env();
        env::set_var("AUTH_SECRET", "base64:AQIDBA==");
        env::set_var("SESSION_LIFETIME_DAYS", MAX_SESSION_LIFETIME_DAYS.to_string());
        env::set_var("MAGIC_LINK_TTL_MINUTES", MAX_TOKEN_TTL_MINUTES.to_string());

        let config = AuthConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.secret, vec![1, 2, 3, 4]);
        assert_eq!(config.session_lifetime, Duration::days(MAX_SESSION_LIFETIME_DAYS));
        assert_eq!(config.token_ttl, Duration::minutes(MAX_TOKEN_TTL_MINUTES));
    }
}
