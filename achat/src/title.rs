//! Session titles derived from the first user message.

pub const DEFAULT_TITLE: &str = "New Chat";

const TITLE_WORDS: usize = 6;

/// First six words with punctuation removed and the first letter capitalized.
///
/// ```rust
/// use achat::generate_chat_title;
///
/// assert_eq!(
///     generate_chat_title("what's the role of ATP in cellular respiration?"),
///     "Whats the role of ATP in"
/// );
/// assert_eq!(generate_chat_title("?!"), "New Chat");
/// ```
pub fn generate_chat_title(first_message: &str) -> String {
    let words = first_message
        .split_whitespace()
        .take(TITLE_WORDS)
        .collect::<Vec<_>>()
        .join(" ");

    let cleaned = words
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut chars = cleaned.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => DEFAULT_TITLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_use_at_most_six_words() {
        assert_eq!(
            generate_chat_title("explain the krebs cycle step by step please"),
            "Explain the krebs cycle step by"
        );
    }

    #[test]
    fn blank_or_symbol_only_messages_fall_back() {
        assert_eq!(generate_chat_title(""), DEFAULT_TITLE);
        assert_eq!(generate_chat_title("   "), DEFAULT_TITLE);
        assert_eq!(generate_chat_title("... ???"), DEFAULT_TITLE);
    }

    #[test]
    fn non_ascii_letters_are_kept() {
        assert_eq!(generate_chat_title("élan vital?"), "Élan vital");
    }
}
