//! Page-local text search.
//!
//! Only the text of the current page is consulted; there is no
//! document-wide index.

use crate::error::ViewerError;
use regex::RegexBuilder;

/// What to look for on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Case-insensitive substring
    Text(String),
    /// Case-insensitive regular expression
    Pattern(String),
}

impl SearchQuery {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(text) | Self::Pattern(text) => text,
        }
    }
}

/// Result of searching the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// 1-based page that was searched
    pub page: u32,
    pub query: String,
    pub found: bool,
}

/// Joins the page's text fragments the way they read on the page.
pub fn page_text(fragments: &[String]) -> String {
    fragments.join(" ")
}

/// Tests `text` against `query`. Blank queries are rejected before any
/// matching happens.
pub fn page_matches(text: &str, query: &SearchQuery) -> Result<bool, ViewerError> {
    if query.as_str().trim().is_empty() {
        return Err(ViewerError::EmptySearch);
    }

    match query {
        SearchQuery::Text(needle) => Ok(text.to_lowercase().contains(&needle.to_lowercase())),
        SearchQuery::Pattern(pattern) => {
            let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
            Ok(regex.is_match(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(query: &str) -> SearchQuery {
        SearchQuery::Text(query.to_owned())
    }

    #[test]
    fn substring_match_ignores_case() {
        let page = page_text(&["the quick".to_owned(), "FOO fox".to_owned()]);

        assert!(page_matches(&page, &text("foo")).expect("valid query"));
        assert!(page_matches(&page, &text("Quick Foo")).expect("valid query"));
        assert!(!page_matches(&page, &text("bar")).expect("valid query"));
    }

    #[test]
    fn blank_query_is_rejected() {
        assert!(matches!(page_matches("anything", &text("   ")), Err(ViewerError::EmptySearch)));
        assert!(matches!(
            page_matches("anything", &SearchQuery::Pattern(String::new())),
            Err(ViewerError::EmptySearch)
        ));
    }

    #[test]
    fn pattern_match_uses_regex() {
        let page = "Invoice 2024-03 total";

        let dated = SearchQuery::Pattern(r"\d{4}-\d{2}".to_owned());
        assert!(page_matches(page, &dated).expect("valid"));
        assert!(page_matches(page, &SearchQuery::Pattern("^invoice".to_owned())).expect("valid"));
        assert!(!page_matches(page, &SearchQuery::Pattern("^total".to_owned())).expect("valid"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err =
            page_matches("x", &SearchQuery::Pattern("(".to_owned())).expect_err("bad pattern");
        assert!(matches!(err, ViewerError::InvalidPattern(_)));
    }
}
