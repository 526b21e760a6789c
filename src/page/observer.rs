//! Mutation-driven page policies.
//!
//! The host registers two subscriptions at startup (element insertion and
//! client-side URL changes) and forwards them here. Callback bodies never let
//! an error escape: the observer has to keep running for the life of the
//! page, so everything is caught and logged at this boundary.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use scraper::{Html, Selector};
use tracing::{debug, error};

use crate::core::config::Config;
use crate::page::archived;
use crate::page::cosmetic;
use crate::page::dom::{HostPage, PageEvent};
use crate::page::guard::RecencyGuard;

/// Elements whose clicks the engine wants to see.
pub const QUALIFYING_SELECTORS: &[&str] = &["a.btn", "#action-manual a", "#action-nmm a"];

const REQUIREMENTS_POPUP_SELECTOR: &str = ".popup-mod-requirements";
const REQUIREMENTS_ACTION_SELECTOR: &str = ".popup-mod-requirements a.btn";
const SCROLL_TARGET_SELECTOR: &str = "#section";

/// Debounce window for URL-change handling; client-side routers fire in
/// bursts.
const URL_CHANGE_DEBOUNCE_MS: u64 = 400;

pub struct PageObserver {
    host: Arc<dyn HostPage>,
    config: Arc<Config>,
    /// The interstitial skip fires once per popup appearance and re-arms only
    /// after the popup is confirmed gone.
    requirements_handled: AtomicBool,
    url_debounce: RecencyGuard,
}

impl PageObserver {
    pub fn new(host: Arc<dyn HostPage>, config: Arc<Config>) -> Self {
        Self {
            host,
            config,
            requirements_handled: AtomicBool::new(false),
            url_debounce: RecencyGuard::new(Duration::from_millis(URL_CHANGE_DEBOUNCE_MS)),
        }
    }

    /// The requirements tab is never worth landing on: send the visitor to
    /// the files tab instead. Pure so it can run before anything is wired up.
    pub fn requirements_tab_redirect(url: &str) -> Option<String> {
        if url.contains("tab=requirements") {
            Some(url.replace("tab=requirements", "tab=files"))
        } else {
            None
        }
    }

    /// Initial page scan: redirect away from the requirements tab, hide
    /// upsells, arm interception, and rebuild archived controls.
    pub async fn on_page_load(&self, url: &str, html: &str) {
        if self.config.skip_requirements {
            if let Some(target) = Self::requirements_tab_redirect(url) {
                debug!("redirecting requirements tab to files tab");
                self.host.navigate(&target).await;
                return;
            }
        }
        if self.config.hide_premium_upsells {
            self.host.inject_style(&cosmetic::upsell_css()).await;
        }
        for selector in QUALIFYING_SELECTORS {
            self.host.arm_click_interception(selector).await;
        }
        if let Err(e) = self.apply_archived(url, html).await {
            error!(error = %e, "archived transform failed during page load");
        }
    }

    /// Single entry point for mutation notifications. Errors stop here.
    pub async fn on_event(&self, event: PageEvent) {
        let result = match event {
            PageEvent::ElementsAdded { fragment_html } => {
                self.elements_added(&fragment_html).await
            }
            PageEvent::UrlChanged { url } => self.url_changed(&url).await,
        };
        if let Err(e) = result {
            error!(error = %e, "observer callback failed");
        }
    }

    async fn elements_added(&self, fragment_html: &str) -> Result<()> {
        // Scan synchronously and drop the parsed fragment before any await,
        // so hosts can spawn event handling onto a runtime.
        let (matched, fragment_has_action) = scan_fragment(fragment_html);

        for selector in matched {
            self.host.arm_click_interception(selector).await;
        }

        if self.config.skip_requirements {
            self.sync_requirements_popup(fragment_has_action).await;
        }
        Ok(())
    }

    /// Auto-dismiss the required-files interstitial: click its single action
    /// button once per appearance, then wait for it to disappear before
    /// re-arming.
    async fn sync_requirements_popup(&self, fragment_has_action: bool) {
        if fragment_has_action {
            if !self.requirements_handled.swap(true, Ordering::SeqCst) {
                debug!("auto-clicking required-files download");
                self.host.click_selector(REQUIREMENTS_ACTION_SELECTOR).await;
            }
            return;
        }

        // Nothing popup-related in this batch: check whether a previously
        // handled popup is gone so the next appearance fires again.
        if self.requirements_handled.load(Ordering::SeqCst) {
            let document = self.host.document_html().await;
            if !document_has(&document, REQUIREMENTS_POPUP_SELECTOR) {
                debug!("requirements popup closed");
                self.requirements_handled.store(false, Ordering::SeqCst);
            }
        }
    }

    async fn url_changed(&self, url: &str) -> Result<()> {
        if !self.url_debounce.try_claim(hash_key(url)) {
            return Ok(());
        }
        debug!(%url, "client-side URL change");
        let html = self.host.document_html().await;
        self.apply_archived(url, &html).await?;
        self.host.scroll_into_view(SCROLL_TARGET_SELECTOR).await;
        Ok(())
    }

    /// Plan and apply the archived-listing rewrite, then make sure the new
    /// controls are intercepted.
    async fn apply_archived(&self, url: &str, html: &str) -> Result<()> {
        let rewrites = archived::plan(url, html);
        if rewrites.is_empty() {
            return Ok(());
        }
        debug!(count = rewrites.len(), "rebuilding archived download controls");
        for rewrite in &rewrites {
            self.host
                .set_section_html(archived::DOWNLOAD_SECTIONS_SELECTOR, rewrite.index, &rewrite.html)
                .await;
        }
        self.host.arm_click_interception("a.btn").await;
        Ok(())
    }
}

/// Which qualifying selectors an inserted fragment matches, plus whether it
/// contains the requirements-popup action button.
fn scan_fragment(fragment_html: &str) -> (Vec<&'static str>, bool) {
    let fragment = Html::parse_fragment(fragment_html);
    let matched = QUALIFYING_SELECTORS
        .iter()
        .copied()
        .filter(|selector| {
            Selector::parse(selector)
                .map(|sel| fragment.select(&sel).next().is_some())
                .unwrap_or(false)
        })
        .collect();
    let has_action = Selector::parse(REQUIREMENTS_ACTION_SELECTOR)
        .map(|sel| fragment.select(&sel).next().is_some())
        .unwrap_or(false);
    (matched, has_action)
}

fn document_has(html: &str, selector: &str) -> bool {
    let document = Html::parse_document(html);
    Selector::parse(selector)
        .map(|sel| document.select(&sel).next().is_some())
        .unwrap_or(false)
}

fn hash_key(url: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    hasher.finish()
}
