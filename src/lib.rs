pub mod core;
pub mod extract;
pub mod page;
pub mod resolver;
pub mod transport;

// --- Primary exports ---
pub use crate::core::config::{
    Config, ConfigManager, ConfigStore, FileConfigStore, MemoryConfigStore,
};
pub use crate::core::engine::Engine;
pub use crate::core::types::{AttemptState, DownloadMode, DownloadRequest};

pub use extract::extract;
pub use page::click::{ClickController, ClickDisposition, ClickEvent, ElementHandle};
pub use page::dom::{ElementId, HostPage, PageEvent, SYNTHETIC_ELEMENT};
pub use page::feedback::{ButtonColor, ButtonVisual, UiHandle};
pub use page::guard::RecencyGuard;
pub use page::observer::PageObserver;
pub use resolver::{DownloadResolver, ResolveError};
pub use transport::{Method, RawResponse, Transport, TransportError};
