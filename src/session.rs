use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};
use data_encoding::BASE64URL_NOPAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::auth::AccessCredential;
use crate::config::CookieConfig;
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "chatrelay_session";

/// Only the newest challenge can ever verify; the rest bound cookie growth.
pub const MAX_PENDING_CHALLENGES: usize = 4;

/// Per-browser state, carried entirely in a signed cookie.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    challenges: Vec<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    credential: Option<AccessCredential>,
    #[serde(default)]
    issued_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Keeps at most [`MAX_PENDING_CHALLENGES`], dropping the oldest.
    pub fn push_challenge(&mut self, challenge: String) {
        if self.challenges.len() >= MAX_PENDING_CHALLENGES {
            let excess = self.challenges.len() + 1 - MAX_PENDING_CHALLENGES;
            self.challenges.drain(..excess);
        }
        self.challenges.push(challenge);
    }

    /// Flash read: returns every pending challenge and leaves none behind.
    pub fn take_challenges(&mut self) -> Vec<String> {
        std::mem::take(&mut self.challenges)
    }

    pub fn pending_challenges(&self) -> usize {
        self.challenges.len()
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn set_channel(&mut self, channel: impl Into<String>) {
        self.channel = Some(channel.into());
    }

    pub fn credential(&self) -> Option<&AccessCredential> {
        self.credential.as_ref()
    }

    pub fn set_credential(&mut self, credential: AccessCredential) {
        self.credential = Some(credential);
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }
}

#[derive(Debug)]
pub enum SessionError {
    Malformed,
    BadSignature,
    Decode(String),
    Expired,
    BadKey,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Malformed => write!(f, "malformed cookie value"),
            SessionError::BadSignature => write!(f, "signature mismatch"),
            SessionError::Decode(e) => write!(f, "undecodable payload: {e}"),
            SessionError::Expired => write!(f, "session expired"),
            SessionError::BadKey => write!(f, "unusable signing key"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Signs and verifies session cookies. Holds no sessions itself.
#[derive(Clone)]
pub struct SessionStore {
    key: Arc<[u8]>,
    secure: bool,
    max_age: Duration,
}

impl SessionStore {
    pub fn new(config: &CookieConfig) -> Self {
        Self {
            key: Arc::from(config.secret.as_slice()),
            secure: config.secure,
            max_age: config.max_age,
        }
    }

    /// Reads the session from the request cookies.
    ///
    /// A bad cookie degrades to a fresh anonymous session; it is logged and
    /// never reported to the caller.
    pub fn load(&self, headers: &HeaderMap) -> Session {
        let Some(raw) = cookie_value(headers, SESSION_COOKIE) else {
            return Session::default();
        };
        match self.decode(raw) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("corrupted session cookie ({e}), generated new");
                Session::default()
            }
        }
    }

    /// Builds the `Set-Cookie` value carrying `session`.
    pub fn save(&self, session: &Session) -> Result<HeaderValue, AppError> {
        let value = self.encode(session)?;
        let secure = if self.secure { "; Secure" } else { "" };
        let cookie = format!(
            "{SESSION_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{secure}",
            self.max_age.as_secs()
        );
        HeaderValue::from_str(&cookie)
            .map_err(|e| AppError::internal(format!("invalid session cookie: {e}")))
    }

    pub fn encode(&self, session: &Session) -> Result<String, AppError> {
        let mut session = session.clone();
        session.issued_at.get_or_insert_with(Utc::now);

        let json = serde_json::to_vec(&session)
            .map_err(|e| AppError::internal(format!("session serialization failed: {e}")))?;
        let payload = BASE64URL_NOPAD.encode(&json);
        let mut mac = self
            .mac()
            .map_err(|e| AppError::internal(format!("session signing failed: {e}")))?;
        mac.update(payload.as_bytes());
        let signature = BASE64URL_NOPAD.encode(&mac.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    pub fn decode(&self, raw: &str) -> Result<Session, SessionError> {
        let (payload, signature) = raw.split_once('.').ok_or(SessionError::Malformed)?;
        let signature = BASE64URL_NOPAD
            .decode(signature.as_bytes())
            .map_err(|_| SessionError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SessionError::BadSignature)?;

        let json = BASE64URL_NOPAD
            .decode(payload.as_bytes())
            .map_err(|e| SessionError::Decode(e.to_string()))?;
        let session: Session =
            serde_json::from_slice(&json).map_err(|e| SessionError::Decode(e.to_string()))?;

        if let Some(issued_at) = session.issued_at {
            let age = Utc::now().signed_duration_since(issued_at);
            let max_age = i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX);
            if age.num_seconds() > max_age {
                return Err(SessionError::Expired);
            }
        }

        Ok(session)
    }

    fn mac(&self) -> Result<HmacSha256, SessionError> {
        HmacSha256::new_from_slice(&self.key).map_err(|_| SessionError::BadKey)
    }
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|header| header.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| value.trim())
        })
}
