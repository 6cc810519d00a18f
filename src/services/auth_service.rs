use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::models::{Session, User};
use crate::repositories::{RepositoryError, SessionStore, TokenStore, UserRepository};
use crate::services::email_service::{EmailMessage, EmailService};
use crate::services::session_manager::SessionManager;
use crate::services::token_codec::TokenCodec;
use chrono::Duration;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@:]+@[^\s@:]+\.[^\s@:.]+$").unwrap());

const MAX_EMAIL_LENGTH: usize = 254;

pub fn is_valid_email(email: &str) -> bool {
    !email.is_empty() && email.len() <= MAX_EMAIL_LENGTH && EMAIL_PATTERN.is_match(email)
}

/// Accepts only local absolute paths, so a link cannot redirect off-site.
pub fn sanitize_redirect(redirect_to: Option<&str>) -> Option<String> {
    let path = redirect_to?.trim();
    let is_local = path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && !path.chars().any(char::is_control);
    is_local.then(|| path.to_string())
}

pub struct LoginRequest {
    pub email: String,
    pub redirect_to: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IssuedLogin {
    pub token: String,
    pub magic_link: String,
    /// False when the mailer failed; the token is still valid.
    pub delivery_attempted: bool,
}

#[derive(Debug, Clone)]
pub struct CompletedLogin {
    pub session: Session,
    pub user: User,
}

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub session: Session,
}

pub struct AuthService {
    codec: TokenCodec,
    token_store: Arc<dyn TokenStore>,
    user_repository: Arc<dyn UserRepository>,
    sessions: SessionManager,
    email_service: Arc<dyn EmailService>,
    clock: Arc<dyn Clock>,
    base_url: String,
    verify_path: String,
    app_name: String,
}

impl AuthService {
    pub fn new(
        config: &AuthConfig,
        token_store: Arc<dyn TokenStore>,
        user_repository: Arc<dyn UserRepository>,
        session_store: Arc<dyn SessionStore>,
        email_service: Arc<dyn EmailService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            codec: TokenCodec::new(config.secret.clone(), config.token_ttl, config.clock_skew),
            token_store,
            user_repository,
            sessions: SessionManager::new(session_store, config.session_lifetime),
            email_service,
            clock,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            verify_path: config.verify_path.clone(),
            app_name: config.app_name.clone(),
        }
    }

    pub fn session_lifetime(&self) -> Duration {
        self.sessions.lifetime()
    }

    pub fn magic_link_url(&self, token: &str, redirect_to: Option<&str>) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("token", token);
        if let Some(redirect_to) = sanitize_redirect(redirect_to) {
            query.append_pair("redirectTo", &redirect_to);
        }
        format!("{}{}?{}", self.base_url, self.verify_path, query.finish())
    }

    /// Issues a magic-link token and tries to email it.
    ///
    /// Mail failures never fail the call; they surface as `delivery_attempted = false`.
    pub async fn request_login(&self, request: LoginRequest) -> Result<IssuedLogin, AuthError> {
        let email = request.email.trim();
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }

        let token = self.codec.encode(email, self.clock.now())?;
        let magic_link = self.magic_link_url(&token, request.redirect_to.as_deref());

        let message =
            EmailMessage::magic_link(email, &magic_link, self.codec.max_age(), &self.app_name);
        let delivery_attempted = match self.email_service.deliver(&message).await {
            Ok(()) => {
                tracing::info!("magic link sent");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to deliver magic link");
                false
            }
        };

        Ok(IssuedLogin {
            token,
            magic_link,
            delivery_attempted,
        })
    }

    /// Redeems a magic-link token and opens a session.
    ///
    /// The token is recorded as used before the user is resolved, so a failure
    /// past that point burns the link and the user must request a new one.
    pub async fn complete_login(&self, token: &str) -> Result<CompletedLogin, AuthError> {
        let now = self.clock.now();
        let email = self.codec.decode(token, now)?;

        if self.token_store.was_used(token).await? {
            tracing::warn!("rejected replay of a redeemed magic link");
            return Err(AuthError::TokenAlreadyUsed);
        }

        match self.token_store.mark_used(token, &email, now).await {
            Ok(()) => {}
            Err(RepositoryError::AlreadyExists) => {
                tracing::warn!("magic link redeemed concurrently");
                return Err(AuthError::TokenAlreadyUsed);
            }
            Err(e) => return Err(e.into()),
        }

        let mut user = self.user_repository.find_or_create(&email).await?;
        self.user_repository.update_last_login(&email, now).await?;
        user.email_verified = true;
        user.last_login_at = Some(now);

        let session = self.sessions.create(user.id, now).await?;
        tracing::info!(user_id = user.id, "magic link login completed");

        Ok(CompletedLogin { session, user })
    }

    /// Resolves the user behind a session cookie value, if the session is still active.
    pub async fn authenticate(
        &self,
        session_token: &str,
    ) -> Result<Option<AuthenticatedUser>, AuthError> {
        let Some(session) = self.sessions.validate(session_token, self.clock.now()).await? else {
            return Ok(None);
        };

        let user = self.user_repository.find_by_id(session.user_id).await?;
        Ok(user.map(|user| AuthenticatedUser { user, session }))
    }

    pub async fn logout(&self, session_token: &str) -> Result<(), AuthError> {
        self.sessions.revoke(session_token).await
    }

    /// Drops used-token records whose tokens could no longer pass the expiry check anyway.
    pub async fn purge_used_tokens(&self) -> Result<u64, AuthError> {
        let cutoff = self
            .codec
            .max_age()
            .checked_add(&self.codec.clock_skew())
            .and_then(|window| self.clock.now().checked_sub_signed(window));
        let Some(cutoff) = cutoff else {
            // No timestamp lies that far back, so nothing can be purged yet.
            tracing::debug!("purge window out of range; nothing to purge");
            return Ok(0);
        };

        let removed = self.token_store.purge_used_before(cutoff).await?;
        tracing::debug!(removed, "purged used magic link tokens");
        Ok(removed)
    }
}
