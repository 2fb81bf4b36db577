//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::server::PublicationServer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    publications: PublicationServer,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let publications = PublicationServer::new(config.server.base_url());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                publications,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the publication registry
    pub fn publications(&self) -> &PublicationServer {
        &self.inner.publications
    }
}
