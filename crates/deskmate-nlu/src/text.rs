//! Tokenization shared by the intent vectorizer and the hashed embedder.

use regex::Regex;
use std::sync::LazyLock;

/// Tokens are runs of two or more word characters.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").unwrap());

/// English stop words removed before n-gram construction.
static STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and",
    "any", "are", "as", "at", "be", "because", "been", "before", "being", "below",
    "between", "both", "but", "by", "can", "cannot", "could", "did", "do", "does", "doing",
    "don", "down", "during", "each", "either", "else", "etc", "ever", "every", "few", "for",
    "from", "further", "get", "got", "had", "has", "have", "having", "he", "her", "here",
    "hers", "herself", "him", "himself", "his", "how", "however", "if", "in", "into", "is",
    "it", "its", "itself", "just", "ll", "me", "might", "more", "most", "must", "my",
    "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other",
    "our", "ours", "ourselves", "out", "over", "own", "please", "re", "same", "she",
    "should", "so", "some", "still", "such", "than", "that", "the", "their", "theirs",
    "them", "themselves", "then", "there", "these", "they", "this", "those", "through",
    "to", "too", "under", "until", "up", "us", "ve", "very", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would",
    "yet", "you", "your", "yours", "yourself", "yourselves",
];

/// Returns true if `token` (already lower-cased) is a stop word.
pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.binary_search(&token).is_ok()
}

/// Lower-case `text` and split it into tokens of at least two word characters.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Tokenize and drop stop words.
pub fn content_tokens(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !is_stop_word(t))
        .collect()
}

/// Build word n-grams for every `n` in `min_n..=max_n`, joined by a single space.
pub fn ngrams(tokens: &[String], min_n: usize, max_n: usize) -> Vec<String> {
    let mut grams = Vec::new();
    for n in min_n.max(1)..=max_n {
        if n > tokens.len() {
            break;
        }
        for window in tokens.windows(n) {
            grams.push(window.join(" "));
        }
    }
    grams
}

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_words_sorted_for_binary_search() {
        let mut sorted = STOP_WORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, STOP_WORDS.to_vec());
    }

    #[test]
    fn test_tokenize_lowercases_and_drops_single_chars() {
        let tokens = tokenize("How do I reset my Password?");
        assert_eq!(tokens, vec!["how", "do", "reset", "my", "password"]);
    }

    #[test]
    fn test_tokenize_splits_contractions() {
        let tokens = tokenize("I don't get it");
        assert_eq!(tokens, vec!["don", "get", "it"]);
    }

    #[test]
    fn test_content_tokens_removes_stop_words() {
        let tokens = content_tokens("How do I reset my password?");
        assert_eq!(tokens, vec!["reset", "password"]);
    }

    #[test]
    fn test_ngrams_unigrams_and_bigrams() {
        let tokens: Vec<String> = vec!["reset".into(), "password".into(), "email".into()];
        let grams = ngrams(&tokens, 1, 2);
        assert_eq!(
            grams,
            vec!["reset", "password", "email", "reset password", "password email"]
        );
    }

    #[test]
    fn test_ngrams_longer_than_input() {
        let tokens: Vec<String> = vec!["refund".into()];
        assert_eq!(ngrams(&tokens, 1, 3), vec!["refund"]);
        assert!(ngrams(&[], 1, 2).is_empty());
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("  what if   that "), 3);
        assert_eq!(word_count(""), 0);
    }
}
