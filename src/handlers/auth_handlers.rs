use crate::error::AuthError;
use crate::services::auth_service::{sanitize_redirect, AuthenticatedUser, LoginRequest};
use crate::AppState;
use axum::{
    extract::{Form, Query, State},
    response::{IntoResponse, Json, Redirect, Response},
    Extension,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_LOGIN_REDIRECT: &str = "/dashboard";

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    #[serde(rename = "redirectTo", alias = "redirect_to")]
    redirect_to: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    message: &'static str,
    delivery_attempted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    magic_link: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyQuery {
    token: Option<String>,
    #[serde(rename = "redirectTo")]
    redirect_to: Option<String>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    user_id: i64,
    email: String,
    email_verified: bool,
    last_login_at: Option<DateTime<Utc>>,
    expires_at: DateTime<Utc>,
}

pub async fn request_login_handler(
    State(app_state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<LoginResponse>, AuthError> {
    let issued = app_state
        .auth_service
        .request_login(LoginRequest {
            email: form.email,
            redirect_to: form.redirect_to,
        })
        .await?;

    let message = if issued.delivery_attempted {
        "Check your email for a sign-in link"
    } else {
        "We couldn't send the sign-in email. Please try again."
    };

    Ok(Json(LoginResponse {
        message,
        delivery_attempted: issued.delivery_attempted,
        magic_link: app_state.expose_magic_links.then_some(issued.magic_link),
    }))
}

pub async fn verify_handler(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        return Redirect::to("/signin?error=missing-token").into_response();
    };

    match app_state.auth_service.complete_login(&token).await {
        Ok(login) => {
            let jar = jar.add(
                app_state
                    .session_cookie
                    .session_cookie(&login.session.session_token),
            );
            let destination = sanitize_redirect(query.redirect_to.as_deref())
                .unwrap_or_else(|| DEFAULT_LOGIN_REDIRECT.to_string());

            (jar, Redirect::to(&destination)).into_response()
        }
        Err(e) if e.is_link_failure() => {
            tracing::info!(reason = %e, "magic link rejected");
            Redirect::to("/signin?error=invalid-token").into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "magic link login failed");
            Redirect::to("/signin?error=server-error").into_response()
        }
    }
}

pub async fn signout_handler(State(app_state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(&app_state.session_cookie.name) {
        if let Err(e) = app_state.auth_service.logout(cookie.value()).await {
            tracing::warn!(error = %e, "failed to revoke session during sign-out");
        }
    }

    let jar = jar.remove(app_state.session_cookie.removal_cookie());
    (jar, Redirect::to("/")).into_response()
}

pub async fn current_session_handler(
    Extension(current): Extension<AuthenticatedUser>,
) -> Json<SessionResponse> {
    Json(SessionResponse {
        user_id: current.user.id,
        email: current.user.email,
        email_verified: current.user.email_verified,
        last_login_at: current.user.last_login_at,
        expires_at: current.session.expires_at,
    })
}
