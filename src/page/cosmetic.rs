//! Cosmetic suppression of premium upsell banners.
//!
//! A static selector list, nothing more. The selectors are part of the
//! semi-stable markup contract with the host page and will break when the
//! page redesigns; keep the list small and obvious.

pub const UPSELL_SELECTORS: &[&str] = &[
    ".premium-banner",
    ".premium-block",
    "#vortex-ad",
    ".download-cta .upsell",
    "[data-ad-unit]",
];

/// Style sheet the host injects when `hide_premium_upsells` is on.
pub fn upsell_css() -> String {
    format!("{} {{ display: none !important; }}", UPSELL_SELECTORS.join(",\n"))
}
