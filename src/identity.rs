use reqwest::Client;
use serde::Deserialize;
use std::fmt;

use crate::auth::AccessCredential;

#[derive(Debug)]
pub enum IdentityError {
    Http(reqwest::Error),
    ServerError { status: u16, body: String },
    NoProfile,
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::Http(e) => write!(f, "HTTP error: {e}"),
            IdentityError::ServerError { status, body } => {
                write!(f, "server returned {status}: {body}")
            }
            IdentityError::NoProfile => write!(f, "no profile for this token"),
        }
    }
}

impl std::error::Error for IdentityError {}

impl From<reqwest::Error> for IdentityError {
    fn from(e: reqwest::Error) -> Self {
        IdentityError::Http(e)
    }
}

/// The caller's chat identity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Profile {
    /// Login name, used as the chat nick.
    #[serde(rename = "login")]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Deserialize)]
struct ProfileList {
    data: Vec<Profile>,
}

/// Looks up the profile owning an access token.
#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    base_url: String,
    client_id: String,
}

impl IdentityClient {
    pub fn new(base_url: String, client_id: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            client_id,
        }
    }

    pub async fn get_profile(&self, credential: &AccessCredential) -> Result<Profile, IdentityError> {
        let url = format!("{}/users", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .get(&url)
            .header("Client-Id", &self.client_id)
            .bearer_auth(&credential.access_token)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(IdentityError::ServerError { status, body });
        }

        let list: ProfileList = resp.json().await?;
        list.data.into_iter().next().ok_or(IdentityError::NoProfile)
    }
}
