//! Incremental tag autocomplete bound to a caret position.
//!
//! At most one suggestion request is outstanding per box: a query issued
//! while another is in flight is dropped, not queued.

use tracing::{debug, warn};

use super::caret::{insert_suggestion, parse_query};
use crate::api::{ApiError, TagSuggestionSource};
use crate::domain::TagSuggestion;

/// Keys the suggestion box reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    ArrowUp,
    ArrowDown,
    Tab,
    Other,
}

/// What the input should do after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// A suggestion replaced the trailing token. Default handling is prevented.
    Inserted { text: String, caret: usize },
    /// The highlighted index moved. Default handling is prevented.
    Moved { index: usize },
    /// Enter without a highlighted suggestion: let the form submit.
    Submit,
    /// Not handled by the box.
    Ignored,
}

/// State of one tag input with its suggestion list.
#[derive(Debug, Clone, Default)]
pub struct SuggestionBox {
    text: String,
    caret: usize,
    suggestions: Vec<TagSuggestion>,
    /// `suggestions.len()` means nothing is highlighted.
    index: usize,
    fetching: bool,
}

impl SuggestionBox {
    /// Create a box holding `text` with the caret at its end.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let caret = text.chars().count();
        Self {
            text,
            caret,
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    #[cfg(test)]
    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn suggestions(&self) -> &[TagSuggestion] {
        &self.suggestions
    }

    pub fn index(&self) -> usize {
        self.index
    }

    #[cfg(test)]
    pub fn is_fetching(&self) -> bool {
        self.fetching
    }

    /// Record a change of the input text and caret.
    pub fn set_input(&mut self, text: impl Into<String>, caret: usize) {
        self.text = text.into();
        self.caret = caret.min(self.text.chars().count());
    }

    /// Start a suggestion query for the current trailing token.
    ///
    /// Returns `None` when a previous query is still in flight; the change
    /// is then not queried at all.
    pub fn begin_query(&mut self) -> Option<String> {
        if self.fetching {
            debug!("Suggestion request in flight, dropping query");
            return None;
        }

        self.fetching = true;
        Some(parse_query(&self.text, self.caret).tag_query)
    }

    /// Complete the in-flight query. Failures keep the previous list.
    pub fn finish_query(&mut self, result: Result<Vec<TagSuggestion>, ApiError>) {
        self.fetching = false;

        match result {
            Ok(suggestions) => {
                self.index = 0;
                self.suggestions = suggestions;
            }
            Err(e) => {
                warn!("Tag suggestion request failed: {}", e);
            }
        }
    }

    /// Handle a change event: update the input and query `source` unless a
    /// request is already outstanding. Returns whether a query was issued.
    pub async fn on_change<S>(&mut self, source: &S, text: impl Into<String>, caret: usize) -> bool
    where
        S: TagSuggestionSource,
    {
        self.set_input(text, caret);

        let Some(query) = self.begin_query() else {
            return false;
        };

        let result = source.suggest_tags(&query).await;
        self.finish_query(result);
        true
    }

    pub fn on_key(&mut self, key: Key) -> KeyOutcome {
        match key {
            Key::Enter => match self.insert_at(self.index) {
                Some((text, caret)) => KeyOutcome::Inserted { text, caret },
                None => KeyOutcome::Submit,
            },
            Key::ArrowUp => {
                self.index = self.index.saturating_sub(1);
                KeyOutcome::Moved { index: self.index }
            }
            Key::ArrowDown | Key::Tab => {
                self.index = (self.index + 1).min(self.suggestions.len());
                KeyOutcome::Moved { index: self.index }
            }
            Key::Other => KeyOutcome::Ignored,
        }
    }

    /// Pointer-down on the suggestion at `idx`.
    pub fn select(&mut self, idx: usize) -> Option<(String, usize)> {
        self.insert_at(idx)
    }

    fn insert_at(&mut self, idx: usize) -> Option<(String, usize)> {
        let name = self.suggestions.get(idx)?.name.clone();
        let (text, caret) = insert_suggestion(&self.text, self.caret, &name);

        self.text = text.clone();
        self.caret = caret;
        self.suggestions.clear();

        Some((text, caret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn tag(name: &str, upload_count: u64) -> TagSuggestion {
        TagSuggestion {
            name: name.to_string(),
            upload_count,
        }
    }

    struct FakeTags {
        queries: RefCell<Vec<String>>,
    }

    impl TagSuggestionSource for FakeTags {
        async fn suggest_tags(&self, query: &str) -> Result<Vec<TagSuggestion>, ApiError> {
            self.queries.borrow_mut().push(query.to_string());
            Ok(vec![tag(&format!("{}t", query), 3), tag(&format!("{}tnip", query), 1)])
        }
    }

    fn box_with(text: &str, suggestions: Vec<TagSuggestion>) -> SuggestionBox {
        let mut sbox = SuggestionBox::new(text);
        sbox.begin_query();
        sbox.finish_query(Ok(suggestions));
        sbox
    }

    #[tokio::test]
    async fn test_on_change_queries_trailing_token() {
        let source = FakeTags {
            queries: RefCell::new(Vec::new()),
        };
        let mut sbox = SuggestionBox::new("");

        assert!(sbox.on_change(&source, "dog -Ca", 7).await);
        assert_eq!(source.queries.borrow().as_slice(), ["ca"]);
        assert_eq!(sbox.suggestions().len(), 2);
        assert_eq!(sbox.index(), 0);
        assert!(!sbox.is_fetching());
    }

    #[test]
    fn test_query_dropped_while_in_flight() {
        let mut sbox = SuggestionBox::new("ca");
        assert_eq!(sbox.begin_query().as_deref(), Some("ca"));

        sbox.set_input("cat", 3);
        assert_eq!(sbox.begin_query(), None);

        sbox.finish_query(Ok(vec![tag("cat", 1)]));
        assert_eq!(sbox.begin_query().as_deref(), Some("cat"));
    }

    #[test]
    fn test_failed_query_keeps_previous_suggestions() {
        let mut sbox = box_with("ca", vec![tag("cat", 1)]);
        sbox.begin_query();
        sbox.finish_query(Err(ApiError::Status {
            url: "http://localhost/api/v1/tags/suggestions".to_string(),
            status: 500,
            body: String::new(),
        }));
        assert_eq!(sbox.suggestions().len(), 1);
        assert!(!sbox.is_fetching());
    }

    #[test]
    fn test_arrow_up_clamps_at_zero() {
        let mut sbox = box_with("ca", vec![tag("cat", 1), tag("catnip", 1)]);
        for _ in 0..5 {
            assert_eq!(sbox.on_key(Key::ArrowUp), KeyOutcome::Moved { index: 0 });
        }
    }

    #[test]
    fn test_arrow_down_and_tab_clamp_at_len() {
        let mut sbox = box_with("ca", vec![tag("cat", 1), tag("catnip", 1)]);
        assert_eq!(sbox.on_key(Key::ArrowDown), KeyOutcome::Moved { index: 1 });
        assert_eq!(sbox.on_key(Key::Tab), KeyOutcome::Moved { index: 2 });
        for _ in 0..5 {
            assert_eq!(sbox.on_key(Key::ArrowDown), KeyOutcome::Moved { index: 2 });
            assert_eq!(sbox.on_key(Key::Tab), KeyOutcome::Moved { index: 2 });
        }
        assert_eq!(sbox.on_key(Key::ArrowUp), KeyOutcome::Moved { index: 1 });
    }

    #[test]
    fn test_enter_inserts_highlighted_suggestion() {
        let mut sbox = box_with("he~ca", vec![tag("cat", 1), tag("catnip", 1)]);
        sbox.on_key(Key::ArrowDown);

        assert_eq!(
            sbox.on_key(Key::Enter),
            KeyOutcome::Inserted {
                text: "he~catnip ".to_string(),
                caret: 10
            }
        );
        assert!(sbox.suggestions().is_empty());
        assert_eq!(sbox.text(), "he~catnip ");
        assert_eq!(sbox.caret(), 10);
    }

    #[test]
    fn test_enter_past_last_suggestion_submits() {
        let mut sbox = box_with("ca", vec![tag("cat", 1)]);
        sbox.on_key(Key::ArrowDown);
        assert_eq!(sbox.on_key(Key::Enter), KeyOutcome::Submit);
        assert_eq!(sbox.text(), "ca");
    }

    #[test]
    fn test_enter_without_suggestions_submits() {
        let mut sbox = SuggestionBox::new("cat");
        assert_eq!(sbox.on_key(Key::Enter), KeyOutcome::Submit);
    }

    #[test]
    fn test_pointer_select_preserves_text_after_caret() {
        let mut sbox = box_with("ca dog", vec![tag("cat", 4)]);
        sbox.set_input("ca dog", 2);
        assert_eq!(sbox.select(0), Some(("cat  dog".to_string(), 4)));
        assert_eq!(sbox.select(0), None);
    }

    #[test]
    fn test_other_keys_ignored() {
        let mut sbox = box_with("ca", vec![tag("cat", 1)]);
        assert_eq!(sbox.on_key(Key::Other), KeyOutcome::Ignored);
        assert_eq!(sbox.index(), 0);
    }
}
