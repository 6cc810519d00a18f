use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::config::AuthConfig;

/// Attributes of the cookie that carries the opaque session token.
#[derive(Debug, Clone)]
pub struct SessionCookieConfig {
    pub name: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub path: String,
    pub max_age: Duration,
}

impl SessionCookieConfig {
    pub fn from_auth_config(config: &AuthConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            secure: config.is_production(),
            http_only: true,
            same_site: SameSite::Lax,
            path: "/".to_string(),
            max_age: Duration::seconds(config.session_lifetime.num_seconds()),
        }
    }

    pub fn session_cookie(&self, session_token: &str) -> Cookie<'static> {
        Cookie::build((self.name.clone(), session_token.to_string()))
            .http_only(self.http_only)
            .secure(self.secure)
            .same_site(self.same_site)
            .path(self.path.clone())
            .max_age(self.max_age)
            .build()
    }

    /// Cookie with matching name and path, suitable for `CookieJar::remove`.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.name.clone(), String::new()))
            .path(self.path.clone())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_cookie_is_lax_http_only_and_not_secure() {
        let config = SessionCookieConfig::from_auth_config(&AuthConfig::development(b"k".to_vec()));
        let cookie = config.session_cookie("abc123");

        assert_eq!(cookie.name(), "session");
        assert_eq!(cookie.value(), "abc123");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::days(7)));
    }

    #[test]
    fn production_cookie_is_secure() {
        let auth = AuthConfig {
            environment: "production".to_string(),
            ..AuthConfig::development(b"k".to_vec())
        };
        let cookie = SessionCookieConfig::from_auth_config(&auth).session_cookie("abc123");
        assert_eq!(cookie.secure(), Some(true));
    }
}
