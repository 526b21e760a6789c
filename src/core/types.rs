use serde::{Deserialize, Serialize};
use url::Url;

/// Which resolution protocol a click maps to, derived from the `nmm` query
/// flag on the clicked link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMode {
    /// Direct POST to the GenerateDownloadUrl endpoint.
    Manual,
    /// Download-manager integration: scrape a server-rendered page fragment.
    LegacyManager,
}

/// Ephemeral per-click resolution input. Constructed at click time, consumed
/// through one resolution, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub file_id: String,
    /// Best-effort, read from the page-level `data-game-id` attribute.
    #[serde(default)]
    pub game_id: Option<String>,
    /// The originating URL; used as Referer and for query inspection.
    pub source_href: String,
    pub mode: DownloadMode,
}

impl DownloadRequest {
    /// Build a request from a link href, if it carries a file identifier
    /// (`file_id`, falling back to `id`). Relative hrefs resolve against
    /// `base`.
    pub fn from_href(href: &str, base: &str, game_id: Option<String>) -> Option<Self> {
        let url = parse_maybe_relative(href, base)?;
        let file_id = query_param(&url, "file_id").or_else(|| query_param(&url, "id"))?;
        let mode = if query_param(&url, "nmm").is_some() {
            DownloadMode::LegacyManager
        } else {
            DownloadMode::Manual
        };
        Some(Self {
            file_id,
            game_id,
            source_href: url.to_string(),
            mode,
        })
    }
}

/// Lifecycle of one download attempt, surfaced in trace output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    Guarded,
    Resolving,
    Succeeded,
    Failed,
}

pub(crate) fn parse_maybe_relative(href: &str, base: &str) -> Option<Url> {
    Url::parse(href)
        .or_else(|_| Url::parse(base).and_then(|b| b.join(href)))
        .ok()
}

pub(crate) fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_with_nmm_selects_legacy_mode() {
        let req = DownloadRequest::from_href(
            "https://www.nexusmods.com/skyrim/mods/5?tab=files&file_id=42&nmm=1",
            "https://www.nexusmods.com/",
            Some("110".into()),
        )
        .unwrap();
        assert_eq!(req.file_id, "42");
        assert_eq!(req.mode, DownloadMode::LegacyManager);
    }

    #[test]
    fn id_param_is_the_fallback() {
        let req = DownloadRequest::from_href(
            "/skyrim/mods/5?id=7",
            "https://www.nexusmods.com/",
            None,
        )
        .unwrap();
        assert_eq!(req.file_id, "7");
        assert_eq!(req.mode, DownloadMode::Manual);
    }

    #[test]
    fn href_without_identifier_is_not_a_download() {
        assert!(DownloadRequest::from_href(
            "https://www.nexusmods.com/skyrim/mods/5?tab=posts",
            "https://www.nexusmods.com/",
            None
        )
        .is_none());
    }
}
