//! Rebuilds download controls for archived file listings.
//!
//! The archived category renders its accordion without the normal download
//! buttons. Sections are paired with their file headers by position, and each
//! gets two replacement links (manager and manual) carrying the file id. The
//! generated markup carries a marker attribute so a re-run skips sections that
//! were already rebuilt.

use scraper::{Html, Selector};
use url::Url;

/// Marker attribute stamped on generated controls; sections containing it are
/// left alone on subsequent passes.
pub const PROCESSED_MARKER: &str = "data-nnw-processed";

/// Accordion body that should hold the download controls.
pub const DOWNLOAD_SECTIONS_SELECTOR: &str = ".accordion-downloads";

const FILE_HEADERS_SELECTOR: &str = ".file-expander-header";

const ICON_NMM: &str = "https://www.nexusmods.com/assets/images/icons/icons.svg#icon-nmm";
const ICON_MANUAL: &str = "https://www.nexusmods.com/assets/images/icons/icons.svg#icon-manual";

/// One planned replacement: overwrite the inner markup of the `index`-th
/// download section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedRewrite {
    pub index: usize,
    pub file_id: String,
    pub html: String,
}

/// The transformation only applies to the archived category.
pub fn is_archived_listing(url: &str) -> bool {
    url.contains("?category=archived") || url.contains("&category=archived")
}

/// Plan the rewrites for one document snapshot. Pure; the host applies them.
/// Idempotent per section via [`PROCESSED_MARKER`].
pub fn plan(page_url: &str, html: &str) -> Vec<ArchivedRewrite> {
    if !is_archived_listing(page_url) {
        return Vec::new();
    }
    let Ok(url) = Url::parse(page_url) else {
        return Vec::new();
    };
    let (Ok(sections_sel), Ok(headers_sel)) = (
        Selector::parse(DOWNLOAD_SECTIONS_SELECTOR),
        Selector::parse(FILE_HEADERS_SELECTOR),
    ) else {
        return Vec::new();
    };

    let path = format!(
        "{}://{}{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.path()
    );

    let document = Html::parse_document(html);
    let headers: Vec<_> = document.select(&headers_sel).collect();

    let mut rewrites = Vec::new();
    for (index, section) in document.select(&sections_sel).enumerate() {
        if section.inner_html().contains(PROCESSED_MARKER) {
            continue;
        }
        let Some(file_id) = headers
            .get(index)
            .and_then(|h| h.value().attr("data-id"))
            .filter(|id| !id.is_empty())
        else {
            continue;
        };
        rewrites.push(ArchivedRewrite {
            index,
            file_id: file_id.to_string(),
            html: download_links(&path, file_id),
        });
    }
    rewrites
}

/// Two explicit links per file group: one flagged for the download manager,
/// one for manual mode. Both re-enter the normal click machine.
fn download_links(path: &str, file_id: &str) -> String {
    format!(
        r#"<li>
    <a class="btn inline-flex"
       href="{path}?tab=files&file_id={file_id}&nmm=1"
       data-fileid="{file_id}"
       data-manager="true"
       {PROCESSED_MARKER}="true"
       tabindex="0">
        <svg title="" class="icon icon-nmm"><use xlink:href="{ICON_NMM}"></use></svg>
        <span class="flex-label">Vortex</span>
    </a>
</li>
<li>
    <a class="btn inline-flex"
       href="{path}?tab=files&file_id={file_id}"
       data-fileid="{file_id}"
       data-manager="false"
       {PROCESSED_MARKER}="true"
       tabindex="0">
        <svg title="" class="icon icon-manual"><use xlink:href="{ICON_MANUAL}"></use></svg>
        <span class="flex-label">Manual</span>
    </a>
</li>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://www.nexusmods.com/skyrim/mods/5?tab=files&category=archived";

    fn listing() -> String {
        r#"<div>
            <div class="file-expander-header" data-id="101"></div>
            <div class="accordion-downloads"><li>old</li></div>
            <div class="file-expander-header" data-id="102"></div>
            <div class="accordion-downloads"><li>old</li></div>
        </div>"#
            .to_string()
    }

    #[test]
    fn plans_one_rewrite_per_file_group() {
        let rewrites = plan(PAGE, &listing());
        assert_eq!(rewrites.len(), 2);
        assert_eq!(rewrites[0].file_id, "101");
        assert!(rewrites[0].html.contains("file_id=101&nmm=1"));
        assert!(rewrites[0].html.contains(r#"data-manager="false""#));
        // links are built from the path, query stripped
        assert!(rewrites[0]
            .html
            .contains("https://www.nexusmods.com/skyrim/mods/5?tab=files"));
    }

    #[test]
    fn rewritten_sections_are_skipped() {
        let rewrites = plan(PAGE, &listing());
        // splice the generated markup back in, as the host would
        let processed = format!(
            r#"<div>
                <div class="file-expander-header" data-id="101"></div>
                <div class="accordion-downloads">{}</div>
            </div>"#,
            rewrites[0].html
        );
        assert!(plan(PAGE, &processed).is_empty());
    }

    #[test]
    fn non_archived_pages_are_untouched() {
        let url = "https://www.nexusmods.com/skyrim/mods/5?tab=files";
        assert!(plan(url, &listing()).is_empty());
        assert!(!is_archived_listing(url));
    }

    #[test]
    fn header_without_data_id_is_skipped() {
        let html = r#"<div>
            <div class="file-expander-header"></div>
            <div class="accordion-downloads"><li>old</li></div>
        </div>"#;
        assert!(plan(PAGE, html).is_empty());
    }
}
