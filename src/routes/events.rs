use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;

use crate::chat::irc::TwitchIrcSource;
use crate::error::AppError;
use crate::relay::sink::WebSocketSink;
use crate::relay::EventRelay;
use crate::state::AppState;

/// Upgrades to a WebSocket and relays the session's channel chat over it.
pub async fn events(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let session = state.sessions.load(&headers);
    let credential = session
        .credential()
        .cloned()
        .ok_or_else(|| AppError::unauthorized("Please log in first."))?;
    let channel = session
        .channel()
        .map(str::to_string)
        .ok_or_else(|| AppError::validation("Choose a channel first."))?;

    let ws = ws.map_err(|e| AppError::validation(format!("expected a websocket upgrade: {e}")))?;

    let profile = state
        .identity
        .get_profile(&credential)
        .await
        .map_err(|e| AppError::identity(e.to_string()))?;

    let chat_url = state.chat_url.clone();
    Ok(ws.on_upgrade(move |socket| async move {
        let source = TwitchIrcSource::new(chat_url, &profile.name, &credential);
        let sink = WebSocketSink::new(socket);
        tracing::info!(%channel, viewer = %profile.name, "relay started");

        match EventRelay::new(source, sink, channel.as_str()).run().await {
            Ok(()) => tracing::info!(%channel, "relay closed"),
            Err(e) => tracing::warn!(%channel, "relay terminated: {e}"),
        }
    }))
}
