//! Visual and log feedback for the element that triggered a resolution.
//!
//! The engine only ever touches an element's color and label, mirrored here
//! as shared state the host paints back onto the real node. Every transition
//! is total over an absent handle: synthetic invocations have no element.

use std::sync::{Arc, Mutex};

use tracing::{debug, error};

use crate::resolver::ResolveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonColor {
    #[default]
    Unchanged,
    Yellow,
    Green,
    Red,
}

#[derive(Debug, Clone, Default)]
pub struct ButtonVisual {
    pub color: ButtonColor,
    pub label: String,
}

/// Weak association with the clicked element. The engine never owns the
/// element's lifecycle; the host mirrors this state onto it.
#[derive(Clone, Default)]
pub struct UiHandle {
    inner: Arc<Mutex<ButtonVisual>>,
}

impl UiHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ButtonVisual {
        self.inner.lock().unwrap().clone()
    }

    fn paint(&self, color: ButtonColor, label: &str) {
        let mut visual = self.inner.lock().unwrap();
        visual.color = color;
        visual.label = label.to_string();
    }
}

pub fn waiting(handle: Option<&UiHandle>) {
    if let Some(handle) = handle {
        handle.paint(ButtonColor::Yellow, "Wait...");
    }
    debug!("waiting for download URL");
}

pub fn success(handle: Option<&UiHandle>) {
    if let Some(handle) = handle {
        handle.paint(ButtonColor::Green, "Downloading!");
    }
    debug!("download started");
}

/// Terminal failure state. Returns the human-readable message so the caller
/// can reuse it for the optional alert.
pub fn failed(handle: Option<&UiHandle>, reason: &ResolveError) -> String {
    let message = format!("Download failed: {reason}");
    if let Some(handle) = handle {
        handle.paint(ButtonColor::Red, &format!("ERROR: {message}"));
    }
    error!(%message, "download resolution failed");
    message
}
