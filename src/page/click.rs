//! Click interception: per-attempt state machine and duplicate guard.
//!
//! One controller instance serves the whole page. Clicks on armed elements
//! arrive as [`ClickEvent`]s; each qualifying event runs exactly one
//! resolution and ends in a terminal UI state. Nothing here is allowed to
//! propagate an error out of the handler.

use std::sync::Arc;
use std::time::Duration;

use scraper::{Html, Selector};
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

use crate::core::config::Config;
use crate::core::types::{parse_maybe_relative, query_param, AttemptState, DownloadRequest};
use crate::page::dom::{ElementId, HostPage, SYNTHETIC_ELEMENT};
use crate::page::feedback::{self, UiHandle};
use crate::page::guard::RecencyGuard;
use crate::resolver::DownloadResolver;

const AUTO_START_POLL_MS: u64 = 250;
const AUTO_START_BUDGET_MS: u64 = 3_000;
const SLOW_DOWNLOAD_SELECTOR: &str = "#slowDownloadButton";
const POPUP_BUTTON_SELECTOR: &str = ".popup button";

/// The clicked element as the host sees it.
#[derive(Clone)]
pub struct ElementHandle {
    pub id: ElementId,
    pub ui: UiHandle,
    /// Whether this was a real link whose default navigation the host
    /// suppressed on delivery.
    pub is_link: bool,
}

/// A user (or synthetic) click on an armed element.
#[derive(Clone)]
pub struct ClickEvent {
    pub element: Option<ElementHandle>,
    /// The element's link target; absent for non-anchor triggers, in which
    /// case the page URL is inspected instead.
    pub href: Option<String>,
    pub page_url: String,
    /// Page-level `data-game-id`, read by the host from `#section`.
    pub page_game_id: Option<String>,
    /// The click originated inside a requirements popup.
    pub inside_popup: bool,
    /// The click came from a rebuilt archived-files control; auto-close is
    /// suppressed for these so the listing stays usable.
    pub archive_origin: bool,
}

/// What the controller did with a click, mostly for the host and for tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickDisposition {
    /// Duplicate delivery inside the guard window; dropped silently.
    DuplicateSuppressed,
    /// A requirements-popup link: tagged for later feedback, no network.
    PopupTagged { file_id: String },
    /// No file identifier anywhere; not a download click.
    IgnoredNonDownload,
    Resolved { url: String },
    Failed { reason: String },
}

pub struct ClickController {
    resolver: DownloadResolver,
    host: Arc<dyn HostPage>,
    config: Arc<Config>,
    guard: RecencyGuard,
}

impl ClickController {
    pub fn new(resolver: DownloadResolver, host: Arc<dyn HostPage>, config: Arc<Config>) -> Self {
        Self {
            resolver,
            host,
            config,
            guard: RecencyGuard::with_default_window(),
        }
    }

    /// Drive one click through the machine:
    /// `Idle -> Guarded -> Resolving -> {Succeeded | Failed} -> Idle`.
    pub async fn handle_click(&self, event: ClickEvent) -> ClickDisposition {
        let key = event.element.as_ref().map(|e| e.id).unwrap_or(SYNTHETIC_ELEMENT);
        if !self.guard.try_claim(key) {
            debug!(element = key, "duplicate click delivery suppressed");
            return ClickDisposition::DuplicateSuppressed;
        }
        debug!(element = key, state = ?AttemptState::Guarded, "click claimed");

        let href = event
            .href
            .clone()
            .unwrap_or_else(|| event.page_url.clone());

        // Requirements-popup links carry an `id` parameter of their own, so
        // they must be recognized before the request parse sees them.
        let request = if href.contains("ModRequirementsPopUp") {
            None
        } else {
            DownloadRequest::from_href(&href, &event.page_url, event.page_game_id.clone())
        };
        let Some(request) = request else {
            return self.handle_non_download(&event, &href).await;
        };

        let ui = event.element.as_ref().map(|e| &e.ui);
        feedback::waiting(ui);
        debug!(
            file_id = %request.file_id,
            mode = ?request.mode,
            state = ?AttemptState::Resolving,
            "resolving download URL"
        );

        if event.inside_popup {
            // Dismiss the surrounding popup; the download proceeds regardless.
            self.host.click_selector(POPUP_BUTTON_SELECTOR).await;
        }

        match self.resolver.resolve(&request).await {
            Ok(url) => {
                feedback::success(ui);
                info!(file_id = %request.file_id, state = ?AttemptState::Succeeded, "navigating to resolved URL");
                self.host.navigate(&url).await;
                self.schedule_auto_close(event.archive_origin);
                ClickDisposition::Resolved { url }
            }
            Err(e) => {
                let message = feedback::failed(ui, &e);
                debug!(state = ?AttemptState::Failed, "resolution failed");
                if self.config.play_error_sound {
                    self.host.play_error_sound().await;
                }
                if self.config.show_alerts {
                    self.host.alert(&message).await;
                }
                if self.config.refresh_on_error {
                    self.host.reload().await;
                }
                // Terminal failure returns the element to idle; the guard
                // claim is dropped so a retry click is not swallowed.
                self.guard.release(key);
                debug!(element = key, state = ?AttemptState::Idle, "attempt reset");
                ClickDisposition::Failed { reason: message }
            }
        }
    }

    /// No file identifier: either a requirements-popup link that gets tagged
    /// for later feedback routing, or simply not a download click. Either
    /// way the element keeps its default behavior.
    async fn handle_non_download(&self, event: &ClickEvent, href: &str) -> ClickDisposition {
        let mut disposition = ClickDisposition::IgnoredNonDownload;
        if href.contains("ModRequirementsPopUp") {
            let popup_file_id = parse_maybe_relative(href, &event.page_url)
                .and_then(|u| query_param(&u, "id"));
            if let (Some(file_id), Some(element)) = (popup_file_id, &event.element) {
                self.host
                    .set_element_id(element.id, &format!("popup{file_id}"))
                    .await;
                disposition = ClickDisposition::PopupTagged { file_id };
            }
        } else {
            debug!("click carried no file identifier, ignoring");
        }

        // The host suppressed the link's default on delivery; hand it back
        // so the popup opens or the navigation proceeds.
        if let Some(element) = event.element.as_ref().filter(|e| e.is_link) {
            self.host.resume_default(element.id).await;
        }
        disposition
    }

    fn schedule_auto_close(&self, archive_origin: bool) {
        if !self.config.auto_close_tab || archive_origin {
            return;
        }
        let host = Arc::clone(&self.host);
        let delay = Duration::from_millis(self.config.close_tab_time);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            host.close_tab().await;
        });
    }

    /// Entry path for pages loaded with a `file_id` query parameter: wait for
    /// the slow-download trigger to render (it can appear asynchronously,
    /// sometimes behind a shadow root), then drive the machine synthetically.
    pub async fn auto_start(&self) -> Option<ClickDisposition> {
        let page_url = self.host.current_url().await;
        let has_file_id = Url::parse(&page_url)
            .ok()
            .and_then(|u| query_param(&u, "file_id"))
            .is_some();
        if !has_file_id {
            return None;
        }

        let deadline = Instant::now() + Duration::from_millis(AUTO_START_BUDGET_MS);
        let html = loop {
            let html = self.host.document_html().await;
            if has_selector(&html, SLOW_DOWNLOAD_SELECTOR) {
                break html;
            }
            if Instant::now() >= deadline {
                debug!("slow-download trigger never rendered, skipping auto-start");
                return None;
            }
            tokio::time::sleep(Duration::from_millis(AUTO_START_POLL_MS)).await;
        };

        debug!("auto-starting download from page URL");
        Some(
            self.handle_click(ClickEvent {
                element: None,
                href: None,
                page_url,
                page_game_id: page_game_id(&html),
                inside_popup: false,
                archive_origin: false,
            })
            .await,
        )
    }
}

fn has_selector(html: &str, selector: &str) -> bool {
    let document = Html::parse_document(html);
    Selector::parse(selector)
        .map(|sel| document.select(&sel).next().is_some())
        .unwrap_or(false)
}

/// Page-level game identifier, carried on the `#section` element.
pub fn page_game_id(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("#section").ok()?;
    document
        .select(&selector)
        .next()?
        .value()
        .attr("data-game-id")
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_id_read_from_section() {
        let html = r#"<div id="section" data-game-id="1704"></div>"#;
        assert_eq!(page_game_id(html).as_deref(), Some("1704"));
        assert_eq!(page_game_id("<p>nothing</p>"), None);
    }

    #[test]
    fn trigger_detection() {
        assert!(has_selector(
            r#"<a id="slowDownloadButton">x</a>"#,
            SLOW_DOWNLOAD_SELECTOR
        ));
        assert!(!has_selector("<div></div>", SLOW_DOWNLOAD_SELECTOR));
    }
}
