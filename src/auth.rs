use std::fmt;

use data_encoding::HEXLOWER;
use rand::rngs::OsRng;
use rand::RngCore;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::config::OAuthConfig;
use crate::error::AppError;
use crate::session::Session;

/// Bytes of entropy in a CSRF challenge.
const CHALLENGE_BYTES: usize = 32;

/// Bearer credential obtained from the authorization-code exchange.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessCredential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCredential")
            .field("access_token", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Vec<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl From<TokenResponse> for AccessCredential {
    fn from(token: TokenResponse) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            scopes: token.scope,
            expires_in: token.expires_in,
        }
    }
}

/// Generate a fresh hex-encoded CSRF challenge.
pub fn generate_challenge() -> String {
    let mut bytes = [0u8; CHALLENGE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    HEXLOWER.encode(&bytes)
}

/// Authorization-code login guarded by a one-time `state` challenge.
///
/// Session transitions: anonymous, then challenge issued by
/// [`AuthFlow::begin_login`], then authenticated by
/// [`AuthFlow::complete_login`]. A failed check drops the session back to
/// anonymous; nothing is retried. Callers persist the session after both
/// calls regardless of outcome.
#[derive(Clone)]
pub struct AuthFlow {
    config: OAuthConfig,
    client: Client,
}

impl AuthFlow {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Records the channel, issues a challenge and returns the provider URL
    /// to redirect the browser to.
    pub fn begin_login(&self, session: &mut Session, channel: &str) -> Result<String, AppError> {
        let channel = channel.trim();
        if channel.is_empty() {
            return Err(AppError::validation("Empty streamer name!"));
        }

        let challenge = generate_challenge();
        let url = self.authorize_url(&challenge)?;

        session.set_channel(channel);
        session.push_challenge(challenge);
        Ok(url)
    }

    /// Checks `state` against the newest pending challenge, then exchanges
    /// `code` for a credential and stores it in the session.
    pub async fn complete_login(
        &self,
        session: &mut Session,
        state: &str,
        code: &str,
    ) -> Result<AccessCredential, AppError> {
        verify_state(session, state)?;

        let credential = self.exchange(code).await?;
        session.set_credential(credential.clone());
        tracing::info!(scopes = ?credential.scopes, "login completed");
        Ok(credential)
    }

    fn authorize_url(&self, state: &str) -> Result<String, AppError> {
        let scope = self.config.scopes.join(" ");
        let url = Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::internal(format!("bad authorization url: {e}")))?;
        Ok(url.into())
    }

    async fn exchange(&self, code: &str) -> Result<AccessCredential, AppError> {
        if code.is_empty() {
            return Err(AppError::exchange("callback carried no code"));
        }

        let resp = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.config.redirect_url.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::exchange(format!("token request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::exchange(format!(
                "provider returned {status}: {body}"
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AppError::exchange(format!("undecodable token response: {e}")))?;
        Ok(token.into())
    }
}

/// Consumes every pending challenge and compares `state` with the newest one.
pub fn verify_state(session: &mut Session, state: &str) -> Result<(), AppError> {
    let challenges = session.take_challenges();
    match challenges.last() {
        _ if state.is_empty() => Err(AppError::csrf("callback carried no state")),
        None => Err(AppError::csrf("missing state challenge")),
        Some(expected) if expected != state => Err(AppError::csrf(format!(
            "invalid oauth state, expected '{expected}', got '{state}'"
        ))),
        Some(_) => Ok(()),
    }
}
