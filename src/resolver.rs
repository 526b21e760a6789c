//! Turns a file identifier into a concrete download URL.
//!
//! Two protocols exist. Manual mode asks the backend to generate a URL with a
//! single POST. The legacy download-manager mode fetches the server-rendered
//! page fragment the manager integration relies on, which is less predictable,
//! so it carries a documented fallback chain: targeted button lookup, then the
//! generic extractor, then one re-issue of the manual POST. No other automatic
//! retries happen anywhere in the pipeline.

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::core::types::{DownloadMode, DownloadRequest};
use crate::extract::extract;
use crate::transport::{Method, Transport, TransportError};

/// Backend path that generates a direct download URL.
pub const GENERATE_URL_PATH: &str = "/Core/Libs/Common/Managers/Downloads?GenerateDownloadUrl";

const SLOW_DOWNLOAD_SELECTOR: &str = "#slowDownloadButton";

/// Why a resolution produced no URL. Exactly one variant per failed attempt;
/// a successful attempt carries the URL instead.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The server answered but no URL could be found in the body. Kept
    /// distinct from transport failures for diagnostics.
    #[error("no download URL in server response")]
    ExtractionMiss,
    #[error("unusable source URL: {0}")]
    BadSource(String),
}

#[derive(Clone)]
pub struct DownloadResolver {
    transport: Transport,
    /// Log raw response previews, driven by the `debug` settings option.
    verbose: bool,
}

impl DownloadResolver {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub async fn resolve(&self, request: &DownloadRequest) -> Result<String, ResolveError> {
        match request.mode {
            DownloadMode::Manual => self.resolve_manual(request).await,
            DownloadMode::LegacyManager => self.resolve_legacy(request).await,
        }
    }

    async fn resolve_manual(&self, request: &DownloadRequest) -> Result<String, ResolveError> {
        let origin = origin_of(&request.source_href)?;
        let endpoint = format!("{origin}{GENERATE_URL_PATH}");
        let body = format!(
            "fid={}&game_id={}",
            utf8_percent_encode(&request.file_id, NON_ALPHANUMERIC),
            utf8_percent_encode(request.game_id.as_deref().unwrap_or(""), NON_ALPHANUMERIC),
        );

        let response = self
            .transport
            .request(
                Method::Post,
                &endpoint,
                &ajax_headers(&origin, &request.source_href, true),
                Some(body),
            )
            .await?;

        if self.verbose {
            debug!(
                file_id = %request.file_id,
                preview = %preview(&response.body),
                "manual generate-url response"
            );
        }
        extract(&response.body).ok_or(ResolveError::ExtractionMiss)
    }

    async fn resolve_legacy(&self, request: &DownloadRequest) -> Result<String, ResolveError> {
        let origin = origin_of(&request.source_href)?;
        let fetched = self
            .transport
            .request(
                Method::Get,
                &request.source_href,
                &ajax_headers(&origin, &request.source_href, false),
                None,
            )
            .await;

        match fetched {
            Ok(response) => {
                if let Some(url) = slow_button_url(&response.body) {
                    return Ok(url);
                }
                if let Some(url) = extract(&response.body) {
                    return Ok(url);
                }
                debug!(
                    file_id = %request.file_id,
                    "legacy page had no extractable URL, falling back to manual POST"
                );
                self.resolve_manual(request).await
            }
            Err(e) => {
                warn!(
                    file_id = %request.file_id,
                    error = %e,
                    "legacy GET failed, falling back to manual POST"
                );
                self.resolve_manual(request).await
            }
        }
    }
}

/// Targeted lookup: the slow-download button exposing `data-download-url`.
fn slow_button_url(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    let selector = Selector::parse(SLOW_DOWNLOAD_SELECTOR).ok()?;
    document
        .select(&selector)
        .next()?
        .value()
        .attr("data-download-url")
        .filter(|u| !u.is_empty())
        .map(|u| u.to_string())
}

/// Header set signaling same-origin AJAX semantics to the backend.
fn ajax_headers(origin: &str, referer: &str, form_post: bool) -> Vec<(&'static str, String)> {
    let mut headers = vec![
        ("Origin", origin.to_string()),
        ("Referer", referer.to_string()),
        ("Sec-Fetch-Site", "same-origin".to_string()),
        ("X-Requested-With", "XMLHttpRequest".to_string()),
    ];
    if form_post {
        headers.push((
            "Content-Type",
            "application/x-www-form-urlencoded; charset=UTF-8".to_string(),
        ));
    }
    headers
}

fn origin_of(href: &str) -> Result<String, ResolveError> {
    let url = Url::parse(href).map_err(|e| ResolveError::BadSource(e.to_string()))?;
    let origin = url.origin();
    if !matches!(origin, url::Origin::Tuple(..)) {
        return Err(ResolveError::BadSource(format!("opaque origin: {href}")));
    }
    Ok(origin.ascii_serialization())
}

fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
