pub mod adapter;
pub mod fetch;
pub mod players;
#[cfg(test)]
pub(crate) mod testing;

use ::scraper::{ElementRef, Selector};
use itertools::Itertools;
use tracing::warn;

pub use adapter::VersionAdapter;
pub use fetch::{pause, Fetch, FetchRequest, HttpFetcher};
pub use players::{parse_players, PageContext};

/// Parse a selector the adapters probe with. A bad selector is treated as a
/// probe that matches nothing.
pub(crate) fn probe_selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!(css, error = %e, "ignoring unparsable selector");
            None
        }
    }
}

/// All text below `element` with runs of whitespace collapsed to single
/// spaces. `None` when nothing but whitespace is left.
pub(crate) fn element_text(element: &ElementRef) -> Option<String> {
    let text = element.text().flat_map(str::split_whitespace).join(" ");
    (!text.is_empty()).then_some(text)
}

/// Collapsed text of the first element matching `selector` inside `element`.
pub(crate) fn select_text(element: &ElementRef, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .find_map(|e| element_text(&e))
}

/// Collapse incidental whitespace in an attribute or text value.
pub(crate) fn clean(value: &str) -> Option<String> {
    let value = value.split_whitespace().join(" ");
    (!value.is_empty()).then_some(value)
}

/// Qualify a protocol-relative or absolute-path asset reference.
pub(crate) fn normalize_img_url(src: &str, origin: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        None
    } else if src.starts_with("//") {
        Some(format!("https:{src}"))
    } else if src.starts_with('/') {
        Some(format!("{}{src}", origin.trim_end_matches('/')))
    } else {
        Some(src.to_string())
    }
}

/// Value of the first run of ASCII digits in `text`.
pub(crate) fn first_digits(text: &str) -> Option<u32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
