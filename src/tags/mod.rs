//! Tag input helpers: trailing-token parsing, suggestion insertion and the
//! suggestion box used by the metadata editing step.

mod caret;
mod suggest_box;

pub use caret::parse_query;
pub use suggest_box::{Key, KeyOutcome, SuggestionBox};

use url::Url;

/// Normalize a space-delimited tag string: lowercase, single spaces.
pub fn normalize_tag_string(tags: &str) -> String {
    tags.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// URL of the search page for a query typed into the search box.
pub fn search_url(base: &Url, text: &str) -> Url {
    let mut url = base.clone();
    url.set_path("/");
    url.set_query(None);
    url.query_pairs_mut().append_pair("q", text.trim());
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tag_string() {
        assert_eq!(normalize_tag_string("  Cat\tdog   ~Fox "), "cat dog ~fox");
        assert_eq!(normalize_tag_string("   "), "");
    }

    #[test]
    fn test_search_url_trims_and_encodes() {
        let base = Url::parse("https://media.example.org/upload").unwrap();
        let url = search_url(&base, "  cat -dog artist:bo ");
        assert_eq!(
            url.as_str(),
            "https://media.example.org/?q=cat+-dog+artist%3Abo"
        );
    }
}
