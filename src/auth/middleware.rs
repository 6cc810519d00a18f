use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::AppState;

/// Resolves the session cookie and exposes the `AuthenticatedUser` as a request extension.
pub async fn require_auth(
    State(app_state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(session_token) = jar
        .get(&app_state.session_cookie.name)
        .map(|cookie| cookie.value().to_string())
    else {
        return Redirect::to("/signin").into_response();
    };

    match app_state.auth_service.authenticate(&session_token).await {
        Ok(Some(authenticated)) => {
            request.extensions_mut().insert(authenticated);
            next.run(request).await
        }
        Ok(None) => {
            // Stale or revoked session; drop the cookie so the browser stops sending it.
            let jar = jar.remove(app_state.session_cookie.removal_cookie());
            (jar, Redirect::to("/signin")).into_response()
        }
        Err(e) => e.into_response(),
    }
}
