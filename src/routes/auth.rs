use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::auth::verify_state;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub code: String,
    /// Set by the provider when the user declines.
    pub error: Option<String>,
}

/// Redirects to the provider with a fresh `state` challenge.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LoginQuery>,
) -> Result<Response, AppError> {
    let mut session = state.sessions.load(&headers);
    let url = state.auth.begin_login(&mut session, &query.name)?;
    let cookie = state.sessions.save(&session)?;

    Ok(([(SET_COOKIE, cookie)], Redirect::temporary(&url)).into_response())
}

/// The provider's `redirect_uri`. The session is written back whatever the
/// outcome so a consumed challenge can never be replayed.
pub async fn oauth_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let mut session = state.sessions.load(&headers);

    let result = match query.error.as_deref() {
        Some(denied) => verify_state(&mut session, &query.state).and(Err(AppError::exchange(
            format!("authorization denied: {denied}"),
        ))),
        None => state
            .auth
            .complete_login(&mut session, &query.state, &query.code)
            .await
            .map(drop),
    };

    let cookie = state.sessions.save(&session)?;
    match result {
        Ok(()) => Ok(([(SET_COOKIE, cookie)], Redirect::temporary("/stream")).into_response()),
        Err(e) => Ok(([(SET_COOKIE, cookie)], e).into_response()),
    }
}
