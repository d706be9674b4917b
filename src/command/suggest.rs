use anyhow::{bail, Result};

use super::api_client;
use crate::config::ClientConfig;
use crate::tags::{parse_query, search_url, Key, KeyOutcome, SuggestionBox};

pub async fn run_suggest(
    config: &ClientConfig,
    text: String,
    caret: Option<usize>,
    pick: Option<usize>,
    search: bool,
) -> Result<()> {
    let client = api_client(config)?;

    if search {
        println!("{}", search_url(client.base_url(), &text));
        return Ok(());
    }

    let caret = caret.unwrap_or_else(|| text.chars().count());
    let parsed = parse_query(&text, caret);
    if parsed.operator.is_empty() {
        println!("Query: {:?}", parsed.tag_query);
    } else {
        println!("Query: {:?} (operator {:?})", parsed.tag_query, parsed.operator);
    }

    let mut suggestions = SuggestionBox::default();
    suggestions.on_change(&client, text, caret).await;

    if suggestions.suggestions().is_empty() {
        println!("No suggestions.");
        return Ok(());
    }

    for (i, tag) in suggestions.suggestions().iter().enumerate() {
        println!("  {:>2}) {} ({})", i + 1, tag.name, tag.upload_count);
    }

    let Some(pick) = pick else {
        return Ok(());
    };
    if pick == 0 || pick > suggestions.suggestions().len() {
        bail!(
            "--pick must be between 1 and {}",
            suggestions.suggestions().len()
        );
    }

    if let Some((text, caret)) = highlight_and_insert(&mut suggestions, pick - 1) {
        println!("\n{}", text);
        println!("(caret at {})", caret);
    }

    Ok(())
}

/// Move the highlight to `index` and accept it, the way the arrow keys and
/// Enter drive the box.
pub(super) fn highlight_and_insert(
    suggestions: &mut SuggestionBox,
    index: usize,
) -> Option<(String, usize)> {
    while suggestions.index() > index {
        suggestions.on_key(Key::ArrowUp);
    }
    while suggestions.index() < index {
        suggestions.on_key(Key::ArrowDown);
    }

    match suggestions.on_key(Key::Enter) {
        KeyOutcome::Inserted { text, caret } => Some((text, caret)),
        _ => None,
    }
}
