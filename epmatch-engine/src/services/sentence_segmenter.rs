//! Sentence segmentation for cleaned dialogue text
//!
//! Boundaries are `.`, `!` and `?` followed by whitespace or end of text,
//! optionally after closing quotes or brackets. A period does not end a
//! sentence when it belongs to a known abbreviation, an ellipsis or a
//! decimal number. After an initial ("J.") or a dotted acronym ("U.S.",
//! "p.m.") it ends the sentence only when the next word visibly opens a new
//! one.

use once_cell::sync::Lazy;
use std::collections::HashSet;

static ABBREVIATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "mr", "mrs", "ms", "dr", "st", "jr", "sr", "vs", "etc", "e.g", "i.e", "prof", "capt",
        "lt", "col", "gen", "sgt", "det", "insp", "rev", "mt", "ft", "approx",
    ]
    .into_iter()
    .collect()
});

/// Capitalized words that open a sentence rather than continue a name
static SENTENCE_STARTERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "but", "did", "do", "does", "he", "her", "here", "his", "how", "i",
        "if", "is", "it", "it's", "let's", "my", "no", "now", "oh", "okay", "our", "she", "so",
        "that", "the", "then", "there", "these", "they", "this", "we", "well", "what", "when",
        "where", "who", "why", "yes", "you", "your",
    ]
    .into_iter()
    .collect()
});

const CLOSERS: &[char] = &['"', '\'', ')', ']', '\u{201D}', '\u{2019}'];
const OPENERS: &[char] = &['"', '\'', '(', '[', '\u{201C}', '\u{2018}'];

/// Splits dialogue into ordered sentences
#[derive(Debug, Clone)]
pub struct SentenceSegmenter {
    min_words: usize,
}

impl Default for SentenceSegmenter {
    fn default() -> Self {
        Self { min_words: 3 }
    }
}

impl SentenceSegmenter {
    /// Sentences with fewer than `min_words` words are dropped
    pub fn new(min_words: usize) -> Self {
        Self { min_words }
    }

    /// Split `text` into sentences in document order
    ///
    /// Empty or whitespace-only input yields an empty list.
    pub fn segment(&self, text: &str) -> Vec<String> {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return Vec::new();
        }

        split_sentences(&collapsed)
            .into_iter()
            .filter(|s| word_count(s) >= self.min_words)
            .collect()
    }
}

/// Number of whitespace-separated words
pub fn word_count(sentence: &str) -> usize {
    sentence.split_whitespace().count()
}

fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let (_, c) = chars[i];
        if !matches!(c, '.' | '!' | '?') {
            i += 1;
            continue;
        }

        if c == '.' && !period_is_terminal(&chars, i) {
            i += 1;
            continue;
        }

        // Swallow "?!", "!!" and trailing closers
        let mut end = i + 1;
        while end < chars.len() && matches!(chars[end].1, '!' | '?') {
            end += 1;
        }
        while end < chars.len() && CLOSERS.contains(&chars[end].1) {
            end += 1;
        }

        if end == chars.len() || chars[end].1 == ' ' {
            let byte_end = chars.get(end).map(|(b, _)| *b).unwrap_or(text.len());
            let sentence = text[start..byte_end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = byte_end;
        }
        i = end;
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

fn period_is_terminal(chars: &[(usize, char)], i: usize) -> bool {
    let prev = i.checked_sub(1).map(|p| chars[p].1);
    let next = chars.get(i + 1).map(|(_, c)| *c);

    // Ellipsis
    if prev == Some('.') || next == Some('.') {
        return false;
    }

    // Decimal number
    if prev.is_some_and(|p| p.is_ascii_digit()) && next.is_some_and(|n| n.is_ascii_digit()) {
        return false;
    }

    let token = preceding_token(chars, i);
    if ABBREVIATIONS.contains(token.to_lowercase().as_str()) {
        return false;
    }

    if token != "I" && is_letter_abbreviation(&token) {
        return next_word(chars, i).map_or(true, |w| starts_sentence(&w));
    }

    true
}

/// Uppercase initial ("J") or dotted single letters ("U.S", "p.m")
fn is_letter_abbreviation(token: &str) -> bool {
    let single_letter = |p: &str| {
        let mut chars = p.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
    };

    if !token.contains('.') {
        return single_letter(token) && token.chars().all(char::is_uppercase);
    }
    token.split('.').all(single_letter)
}

/// Word following the period at `i`, past closers and openers
fn next_word(chars: &[(usize, char)], i: usize) -> Option<String> {
    let word: String = chars[i + 1..]
        .iter()
        .map(|(_, c)| *c)
        .skip_while(|c| CLOSERS.contains(c) || *c == ' ' || OPENERS.contains(c))
        .take_while(|c| *c != ' ')
        .collect();
    if word.is_empty() {
        None
    } else {
        Some(word)
    }
}

fn starts_sentence(word: &str) -> bool {
    if !word.chars().next().is_some_and(char::is_uppercase) {
        return false;
    }
    let bare = word
        .trim_end_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    SENTENCE_STARTERS.contains(bare.as_str())
}

/// Word immediately before position `i`, without opening punctuation
fn preceding_token(chars: &[(usize, char)], i: usize) -> String {
    let mut j = i;
    while j > 0 && chars[j - 1].1 != ' ' {
        j -= 1;
    }
    chars[j..i]
        .iter()
        .map(|(_, c)| *c)
        .skip_while(|c| OPENERS.contains(c))
        .collect()
}
