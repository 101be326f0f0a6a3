#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::Form;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chatrelay::config::{Config, CookieConfig, OAuthConfig};
use chatrelay::routes;
use chatrelay::state::AppState;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const GOOD_CODE: &str = "good-code";
pub const STALE_CODE: &str = "stale-code";
pub const GOOD_TOKEN: &str = "test-token";
pub const VIEWER_LOGIN: &str = "viewer";

/// Binds a TCP listener on port 0, serves `app` on it, and returns the address.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("127.0.0.1:{}", addr.port())
}

async fn token(Form(form): Form<HashMap<String, String>>) -> impl IntoResponse {
    let token = match form.get("code").map(String::as_str) {
        Some(GOOD_CODE) => GOOD_TOKEN,
        Some(STALE_CODE) => "stale-token",
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "message": "Invalid authorization code" })),
            )
        }
    };
    if form.get("grant_type").map(String::as_str) != Some("authorization_code")
        || form.get("client_secret").map(String::as_str) != Some("client-secret")
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "message": "bad client" })),
        );
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "access_token": token,
            "refresh_token": "refresh",
            "expires_in": 14400,
            "scope": ["chat:read", "whispers:read"],
            "token_type": "bearer"
        })),
    )
}

async fn users(headers: HeaderMap) -> impl IntoResponse {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some(format!("Bearer {GOOD_TOKEN}").as_str())
        && headers.get("client-id").and_then(|v| v.to_str().ok()) == Some("client-id");
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "message": "Invalid OAuth token" })),
        );
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "data": [{ "id": "1", "login": VIEWER_LOGIN, "display_name": "Viewer" }]
        })),
    )
}

/// Serves `/oauth2/token` and `/helix/users`. Returns its base URL.
pub async fn spawn_provider() -> String {
    let app = Router::new()
        .route("/oauth2/token", post(token))
        .route("/helix/users", get(users));
    format!("http://{}", serve(app).await)
}

/// What the fake chat server saw from one client.
#[derive(Debug)]
pub struct ChatSession {
    pub handshake: Vec<String>,
    pub client_closed: bool,
}

/// IRC-over-WebSocket server that answers every connection's handshake with
/// `script`, then waits for the client to leave.
pub async fn spawn_chat_server(script: Vec<String>) -> (String, mpsc::UnboundedReceiver<ChatSession>) {
    chat_server(script, false).await
}

/// Like [`spawn_chat_server`], but hangs up right after sending `script`.
pub async fn spawn_hangup_chat_server(
    script: Vec<String>,
) -> (String, mpsc::UnboundedReceiver<ChatSession>) {
    chat_server(script, true).await
}

async fn chat_server(
    script: Vec<String>,
    hang_up: bool,
) -> (String, mpsc::UnboundedReceiver<ChatSession>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (report, sessions) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let script = script.clone();
            let report = report.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };
                let mut handshake = Vec::new();
                while handshake.len() < 4 {
                    match ws.next().await {
                        Some(Ok(Message::Text(text))) => handshake.push(text.as_str().to_string()),
                        _ => return,
                    }
                }
                for line in &script {
                    if ws.send(Message::Text(line.as_str().into())).await.is_err() {
                        return;
                    }
                }
                let mut client_closed = false;
                if hang_up {
                    let _ = ws.close(None).await;
                }
                while let Some(Ok(msg)) = ws.next().await {
                    if msg.is_close() {
                        client_closed = true;
                        break;
                    }
                }
                let _ = report.send(ChatSession {
                    handshake,
                    client_closed,
                });
            });
        }
    });

    (url, sessions)
}

pub fn test_config(provider_url: &str, chat_url: &str) -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        oauth: OAuthConfig {
            client_id: "client-id".into(),
            client_secret: "client-secret".into(),
            redirect_url: "http://localhost/redirect".into(),
            scopes: vec!["chat:read".into(), "whispers:read".into()],
            auth_url: format!("{provider_url}/oauth2/authorize"),
            token_url: format!("{provider_url}/oauth2/token"),
        },
        cookie: CookieConfig {
            secret: b"0123456789abcdef0123456789abcdef".to_vec(),
            secure: false,
            max_age: Duration::from_secs(3600),
        },
        api_url: format!("{provider_url}/helix"),
        chat_url: chat_url.into(),
    }
}

/// Router whose provider and chat endpoints point nowhere.
pub fn test_app() -> Router {
    let config = test_config("http://127.0.0.1:9", "ws://127.0.0.1:9");
    routes::router(AppState::from_config(&config))
}

pub fn app_with(provider_url: &str, chat_url: &str) -> Router {
    routes::router(AppState::from_config(&test_config(provider_url, chat_url)))
}

/// `name=value` part of a `Set-Cookie` header.
pub fn session_cookie(headers: &HeaderMap) -> String {
    headers
        .get("set-cookie")
        .expect("response sets the session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

pub fn query_param(url: &str, key: &str) -> Option<String> {
    reqwest::Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
