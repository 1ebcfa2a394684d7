//! Build-time and query-time tokenization. The same pipeline must run
//! on both sides or term statistics stop lining up.

/// English stop words removed during tokenization.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "will", "with", "or", "but", "not", "this",
    "these", "they", "them", "their", "there", "then", "than", "so", "if", "when", "where", "why",
    "how", "what", "which", "who", "whom", "whose", "can", "could", "should", "would", "may",
    "might", "must", "shall", "do", "does", "did", "have", "had", "having",
];

/// Lowercase, split on non-alphanumeric boundaries, drop stop words.
/// No stemming, no randomness.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::tokenize;

    #[test]
    fn lowercases_and_splits_on_punctuation() {
        assert_eq!(tokenize("BMW M5: reliability!"), vec!["bmw", "m5", "reliability"]);
    }

    #[test]
    fn drops_stop_words() {
        assert_eq!(tokenize("the car is in the garage"), vec!["car", "garage"]);
    }

    #[test]
    fn keeps_alphanumeric_model_names() {
        assert_eq!(tokenize("335i xDrive"), vec!["335i", "xdrive"]);
    }

    #[test]
    fn empty_and_stop_word_only_input_yields_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("the and of").is_empty());
    }
}
