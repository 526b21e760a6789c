//! Wires the pipeline together over one host page and one configuration
//! snapshot. Configuration is read-only for the lifetime of an engine; a
//! settings change reloads the page context and builds a fresh engine.

use std::sync::Arc;

use crate::core::config::Config;
use crate::page::click::ClickController;
use crate::page::dom::{HostPage, PageEvent};
use crate::page::observer::PageObserver;
use crate::resolver::DownloadResolver;
use crate::transport::Transport;

pub struct Engine {
    config: Arc<Config>,
    host: Arc<dyn HostPage>,
    pub clicks: ClickController,
    pub observer: PageObserver,
}

impl Engine {
    pub fn new(host: Arc<dyn HostPage>, config: Config) -> Self {
        Self::with_client(host, config, reqwest::Client::new())
    }

    /// Build with an injected HTTP client (tests, custom TLS setups).
    pub fn with_client(host: Arc<dyn HostPage>, config: Config, client: reqwest::Client) -> Self {
        let config = Arc::new(config);
        let transport = Transport::new(client, config.request_timeout);
        let resolver = DownloadResolver::new(transport).with_verbose(config.debug);
        let clicks = ClickController::new(resolver, Arc::clone(&host), Arc::clone(&config));
        let observer = PageObserver::new(Arc::clone(&host), Arc::clone(&config));
        Self {
            config,
            host,
            clicks,
            observer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Startup sequence: initial page scan, then the auto-start entry path.
    pub async fn start(&self) {
        let url = self.host.current_url().await;
        let html = self.host.document_html().await;
        self.observer.on_page_load(&url, &html).await;
        self.clicks.auto_start().await;
    }

    /// Forward a mutation notification from the host.
    pub async fn on_event(&self, event: PageEvent) {
        self.observer.on_event(event).await;
    }
}
