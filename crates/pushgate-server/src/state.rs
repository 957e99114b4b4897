//! State shared by every handler

use pushgate_core::{Chain, PushStore};
use reqwest::redirect::Policy;
use std::sync::Arc;

/// Shared application state
#[derive(Debug)]
pub struct AppState {
    /// Immutable processor chains
    pub chain: Chain,

    /// Client used to forward allowed requests upstream
    pub client: reqwest::Client,

    /// Bearer token guarding the decision API; `None` leaves it open
    pub api_key: Option<String>,

    /// Largest request body buffered before running the chain
    pub max_body_bytes: usize,
}

impl AppState {
    /// Build the state around a chain, taking limits from its configuration
    pub fn new(chain: Chain) -> Result<Self, reqwest::Error> {
        let config = Arc::clone(&chain.context().config);
        // git follows redirects itself; the proxy passes them through
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            chain,
            client,
            api_key: config.server.api_key.clone().filter(|key| !key.is_empty()),
            max_body_bytes: config.server.max_body_bytes,
        })
    }

    /// Persistence gateway shared with the chain
    pub fn store(&self) -> &Arc<dyn PushStore> {
        &self.chain.context().store
    }
}
