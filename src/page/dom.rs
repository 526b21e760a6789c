//! The narrow boundary between the engine and the live page.
//!
//! The engine owns policy; the embedding shim owns the document. Events flow
//! in ([`PageEvent`] plus click deliveries), commands flow out through
//! [`HostPage`]. The shim suppresses the default action of armed links when
//! it delivers their clicks; the controller answers every delivery, either
//! with an explicit navigation or with [`HostPage::resume_default`] when the
//! click turns out not to start a download.

use async_trait::async_trait;

/// Host-assigned opaque element identity. The engine never owns elements,
/// only routes feedback and guard state by id.
pub type ElementId = u64;

/// Reserved id for synthetic invocations (the auto-start path).
pub const SYNTHETIC_ELEMENT: ElementId = 0;

/// Mutation-observer notifications, delivered by the host.
#[derive(Debug, Clone)]
pub enum PageEvent {
    /// Nodes were inserted; the payload is their serialized markup.
    ElementsAdded { fragment_html: String },
    /// A client-side URL change was detected (no full navigation).
    UrlChanged { url: String },
}

/// Actions the engine asks the embedding shim to perform on the live page.
///
/// Implementations must be safe to call from spawned tasks; all methods are
/// fire-and-forget from the engine's point of view.
#[async_trait]
pub trait HostPage: Send + Sync {
    /// Navigate the current page/tab.
    async fn navigate(&self, url: &str);

    /// Close the current tab.
    async fn close_tab(&self);

    /// Surface a blocking message to the user.
    async fn alert(&self, message: &str);

    /// Full page reload.
    async fn reload(&self);

    /// Audible failure cue. The engine decides when, the host decides how.
    async fn play_error_sound(&self);

    /// Click the first element matching a CSS selector.
    async fn click_selector(&self, selector: &str);

    /// Replace the inner markup of the n-th element matching `selector`.
    async fn set_section_html(&self, selector: &str, index: usize, html: &str);

    /// Cosmetic scroll to the first element matching `selector`.
    async fn scroll_into_view(&self, selector: &str);

    /// Tag an element with an `id` attribute (popup bookkeeping).
    async fn set_element_id(&self, element: ElementId, id_value: &str);

    /// Re-run an armed link's suppressed default action. Issued when a
    /// delivered click turns out not to start a download, so requirement
    /// popups still open and plain links still navigate.
    async fn resume_default(&self, element: ElementId);

    /// Inject a style sheet into the document head.
    async fn inject_style(&self, css: &str);

    /// Arm click interception for elements matching `selector`, now and for
    /// matching nodes inserted later.
    async fn arm_click_interception(&self, selector: &str);

    /// Snapshot of the current document. Hosts that render parts of the page
    /// behind shadow roots should serialize through them, since the
    /// slow-download trigger can live inside one.
    async fn document_html(&self) -> String;

    /// Current location href.
    async fn current_url(&self) -> String;
}
