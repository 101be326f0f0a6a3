use std::time::Duration;

pub const DEFAULT_AUTH_URL: &str = "https://id.twitch.tv/oauth2/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
pub const DEFAULT_API_URL: &str = "https://api.twitch.tv/helix";
pub const DEFAULT_CHAT_URL: &str = "wss://irc-ws.chat.twitch.tv:443";
pub const DEFAULT_SCOPES: &[&str] = &["chat:read", "chat:edit", "whispers:read"];

/// Minimum length of the cookie signing secret, in bytes.
pub const MIN_COOKIE_SECRET_LEN: usize = 32;

/// OAuth client registration and provider endpoints.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
}

#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub secret: Vec<u8>,
    pub secure: bool,
    pub max_age: Duration,
}

pub struct Config {
    pub host: String,
    pub port: u16,
    pub oauth: OAuthConfig,
    pub cookie: CookieConfig,
    pub api_url: String,
    pub chat_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        let client_id =
            std::env::var("CHATRELAY_CLIENT_ID").expect("CHATRELAY_CLIENT_ID is required");
        let client_secret = std::env::var("CHATRELAY_CLIENT_SECRET")
            .expect("CHATRELAY_CLIENT_SECRET is required");
        let redirect_url = std::env::var("CHATRELAY_REDIRECT_URL")
            .expect("CHATRELAY_REDIRECT_URL is required");

        let scopes = std::env::var("CHATRELAY_SCOPES")
            .map(|raw| parse_scopes(&raw))
            .unwrap_or_else(|_| DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect());

        let secret = std::env::var("CHATRELAY_COOKIE_SECRET")
            .expect("CHATRELAY_COOKIE_SECRET is required")
            .into_bytes();
        assert!(
            secret.len() >= MIN_COOKIE_SECRET_LEN,
            "CHATRELAY_COOKIE_SECRET must be at least {MIN_COOKIE_SECRET_LEN} bytes"
        );

        let max_age_secs: u64 = std::env::var("CHATRELAY_SESSION_MAX_AGE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            oauth: OAuthConfig {
                client_id,
                client_secret,
                redirect_url,
                scopes,
                auth_url: env_or("CHATRELAY_AUTH_URL", DEFAULT_AUTH_URL),
                token_url: env_or("CHATRELAY_TOKEN_URL", DEFAULT_TOKEN_URL),
            },
            cookie: CookieConfig {
                secret,
                secure: std::env::var("CHATRELAY_COOKIE_SECURE")
                    .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
                max_age: Duration::from_secs(max_age_secs),
            },
            api_url: env_or("CHATRELAY_API_URL", DEFAULT_API_URL),
            chat_url: env_or("CHATRELAY_CHAT_URL", DEFAULT_CHAT_URL),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Scopes may be separated by commas, whitespace, or both.
fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
