//! Publication registry
//!
//! Maps URI prefixes to bound publications. A binding is an immutable value
//! built off to the side and published atomically into the map, so request
//! handlers can never observe a partially-constructed entry. The map lock
//! only covers lookup/insert/remove; byte-range reads happen after the
//! `Arc<ServerBinding>` has been cloned out.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::drm::DrmContext;
use crate::error::{AppError, Result};
use crate::fetcher::Fetcher;
use crate::model::{Link, Manifest};
use crate::parser::{ParserChain, SourceFile};

/// Live association between a prefix, a parsed publication and its fetcher.
pub struct ServerBinding {
    pub prefix: String,
    pub manifest: Manifest,
    pub fetcher: Arc<dyn Fetcher>,
}

pub struct PublicationServer {
    base_url: String,
    chain: Arc<ParserChain>,
    bindings: RwLock<HashMap<String, Arc<ServerBinding>>>,
}

impl PublicationServer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_chain(base_url, ParserChain::new())
    }

    pub fn with_chain(base_url: impl Into<String>, chain: ParserChain) -> Self {
        Self {
            base_url: base_url.into(),
            chain: Arc::new(chain),
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// Parse a publication package and start serving it under `prefix`.
    ///
    /// Binding an already-bound prefix is an idempotent no-op that leaves
    /// the original binding intact. Parsing failures leave the registry
    /// untouched and are surfaced to the caller.
    pub async fn bind(
        &self,
        prefix: &str,
        source: SourceFile,
        fetcher: Arc<dyn Fetcher>,
        drm: DrmContext,
        fallback_title: &str,
    ) -> Result<()> {
        {
            let bindings = self.bindings.read().await;
            if bindings.contains_key(prefix) {
                tracing::debug!(prefix, "prefix already bound, keeping existing binding");
                return Ok(());
            }
        }

        // Parsing does blocking archive reads; keep it off the async workers
        // and off the bindings lock.
        let chain = Arc::clone(&self.chain);
        let parse_fetcher = Arc::clone(&fetcher);
        let fallback = fallback_title.to_string();
        let components = tokio::task::spawn_blocking(move || {
            chain.parse(&source, parse_fetcher, &drm, &fallback)
        })
        .await
        .map_err(|e| AppError::Fetch(format!("parser task panicked: {e}")))??;

        let mut manifest = components.manifest;
        manifest.links.push(self.self_link(prefix));

        let binding = Arc::new(ServerBinding {
            prefix: prefix.to_string(),
            manifest,
            fetcher: components.fetcher,
        });

        let mut bindings = self.bindings.write().await;
        // A concurrent bind may have won the race; first writer wins.
        bindings.entry(prefix.to_string()).or_insert_with(|| {
            tracing::info!(prefix, "publication bound");
            binding
        });
        Ok(())
    }

    /// Stop serving the publication under `prefix`. Subsequent requests see
    /// "not found". Returns whether a binding was removed.
    pub async fn unbind(&self, prefix: &str) -> bool {
        let removed = self.bindings.write().await.remove(prefix).is_some();
        if removed {
            tracing::info!(prefix, "publication unbound");
        }
        removed
    }

    /// Clone out the binding for `prefix`, releasing the map lock before the
    /// caller does any I/O against it.
    pub async fn binding(&self, prefix: &str) -> Option<Arc<ServerBinding>> {
        self.bindings.read().await.get(prefix).cloned()
    }

    fn self_link(&self, prefix: &str) -> Link {
        let href = format!(
            "{}/{}/manifest.json",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(prefix)
        );
        Link::new(href)
            .with_media_type("application/webpub+json")
            .with_rel("self")
    }
}
