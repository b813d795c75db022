use std::{collections::HashSet, fmt};

use rayon::prelude::*;
use rust_stemmers::{Algorithm, Stemmer};
use stop_words::{get, LANGUAGE};

use super::lemma::VerbLemmatizer;

/// Shortest token kept (tokens of length <= 2 are noise in headlines).
pub const MIN_TOKEN_LEN: usize = 3;
/// Longest token kept; longer runs are usually glued URLs or garbage.
pub const MAX_TOKEN_LEN: usize = 15;

/// Turns raw headline text into root-form tokens.
///
/// Steps, in order:
/// 1. lowercase and split on every non-alphabetic character, keeping tokens
///    of `MIN_TOKEN_LEN..=MAX_TOKEN_LEN` chars
/// 2. drop stopwords
/// 3. verb lemmatization
/// 4. Snowball English stemming
///
/// Token order and duplicates are preserved. The tokenizer holds no mutable
/// state, so one instance can serve any number of threads.
pub struct Tokenizer {
    stopwords: HashSet<String>,
    lemmatizer: VerbLemmatizer,
    stemmer: Stemmer,
}

impl fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokenizer")
            .field("stopwords", &self.stopwords.len())
            .field("stemmer", &"snowball-english")
            .finish()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    /// Tokenizer with the NLTK English stopword list (via `stop-words`).
    /// It holds function words only; headline vocabulary such as "today" or
    /// "world" is left to the document-frequency filter.
    pub fn new() -> Self {
        let stop_words: Vec<String> = get(LANGUAGE::English);
        Self::with_stopwords(stop_words)
    }

    /// Tokenizer with a caller supplied stopword set (matched after lowercasing).
    pub fn with_stopwords<I, S>(stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            stopwords: stopwords
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
            lemmatizer: VerbLemmatizer::new(),
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    #[inline]
    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }

    /// Tokenize one document. Empty or all-noise text gives an empty vec.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphabetic())
            .filter(|raw| {
                let len = raw.chars().count();
                (MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&len)
            })
            .map(str::to_lowercase)
            .filter(|word| !self.is_stopword(word))
            .map(|word| {
                let lemma = self.lemmatizer.lemmatize(&word);
                self.stemmer.stem(&lemma).into_owned()
            })
            .collect()
    }

    /// Tokenize many documents in parallel; output order matches input order.
    pub fn tokenize_corpus<T>(&self, texts: &[T]) -> Vec<Vec<String>>
    where
        T: AsRef<str> + Sync,
    {
        texts.par_iter().map(|t| self.tokenize(t.as_ref())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> Tokenizer {
        Tokenizer::with_stopwords(["the", "and", "over", "for"])
    }

    #[test]
    fn empty_text_gives_no_tokens() {
        let t = tokenizer();
        assert!(t.tokenize("").is_empty());
        assert!(t.tokenize("  ,.;  42 ").is_empty());
    }

    #[test]
    fn drops_short_tokens_stopwords_and_punctuation() {
        let t = tokenizer();
        let tokens = t.tokenize("The cat, and an ox: over-the-moon!");
        assert_eq!(tokens, vec!["cat".to_string(), "moon".to_string()]);
    }

    #[test]
    fn lemmatizes_then_stems() {
        let t = tokenizer();
        assert_eq!(t.tokenize("running"), vec!["run".to_string()]);
        assert_eq!(t.tokenize("ran"), vec!["run".to_string()]);
        assert_eq!(t.tokenize("Markets"), vec!["market".to_string()]);
    }

    #[test]
    fn keeps_order_and_duplicates() {
        let t = tokenizer();
        let tokens = t.tokenize("police police chase");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0], tokens[1]);
        assert_ne!(tokens[1], tokens[2]);
    }

    #[test]
    fn digits_split_words_and_long_runs_are_dropped() {
        let t = tokenizer();
        let tokens = t.tokenize("covid19 abcdefghijklmnopqrstuvwxyz");
        assert_eq!(tokens, vec!["covid".to_string()]);
    }

    #[test]
    fn default_stopwords_keep_headline_content_words() {
        let t = Tokenizer::new();
        assert!(t.is_stopword("the") && t.is_stopword("and") && t.is_stopword("over"));
        for word in ["today", "world", "new", "home", "help", "million", "group", "show", "first"] {
            assert!(!t.is_stopword(word), "{word} must not be a stopword");
        }
        assert_eq!(
            t.tokenize("Stock markets rally over the world today"),
            vec!["stock", "market", "ralli", "world", "today"]
        );
    }

    #[test]
    fn tokenizing_twice_is_identical() {
        let t = Tokenizer::new();
        let text = "Council approves new budget after heated debate";
        assert_eq!(t.tokenize(text), t.tokenize(text));
    }

    #[test]
    fn corpus_order_is_preserved() {
        let t = tokenizer();
        let docs = ["storm hits coast", "", "markets rally"];
        let out = t.tokenize_corpus(&docs);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], t.tokenize(docs[0]));
        assert!(out[1].is_empty());
        assert_eq!(out[2], t.tokenize(docs[2]));
    }
}
