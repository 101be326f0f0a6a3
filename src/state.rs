use crate::auth::AuthFlow;
use crate::config::Config;
use crate::identity::IdentityClient;
use crate::session::SessionStore;

/// Everything a handler needs, injected into the router at startup.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthFlow,
    pub sessions: SessionStore,
    pub identity: IdentityClient,
    pub chat_url: String,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            auth: AuthFlow::new(config.oauth.clone()),
            sessions: SessionStore::new(&config.cookie),
            identity: IdentityClient::new(config.api_url.clone(), config.oauth.client_id.clone()),
            chat_url: config.chat_url.clone(),
        }
    }
}
