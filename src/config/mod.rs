pub mod auth;
pub mod cookie;

pub use auth::{validate_production_config, AuthConfig, ConfigError};
pub use cookie::SessionCookieConfig;
