//! Context-triggered piecewise hashing (CTPH)
//!
//! A 7-byte rolling hash decides where pieces end; each piece is folded into
//! an FNV-style accumulator and emitted as one base64 character. Small edits
//! only disturb the pieces around them, so digests of similar texts share
//! long runs of characters and compare by edit distance.
//!
//! Digest format: `blocksize:digest1:digest2`, where digest1 is cut at
//! `blocksize` and digest2 at `2 * blocksize`.

use std::collections::HashSet;

use crate::models::FingerprintError;

const ROLLING_WINDOW: usize = 7;
const MIN_BLOCKSIZE: u32 = 3;
const SPAMSUM_LENGTH: usize = 64;
const HASH_PRIME: u32 = 0x0100_0193;
const HASH_INIT: u32 = 0x2802_1967;
const B64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Rolling hash over the last `ROLLING_WINDOW` bytes
struct RollingHash {
    window: [u8; ROLLING_WINDOW],
    h1: u32,
    h2: u32,
    h3: u32,
    n: usize,
}

impl RollingHash {
    fn new() -> Self {
        Self {
            window: [0; ROLLING_WINDOW],
            h1: 0,
            h2: 0,
            h3: 0,
            n: 0,
        }
    }

    fn update(&mut self, c: u8) -> u32 {
        let c32 = c as u32;
        let slot = self.n % ROLLING_WINDOW;

        self.h2 = self.h2.wrapping_sub(self.h1);
        self.h2 = self.h2.wrapping_add((ROLLING_WINDOW as u32).wrapping_mul(c32));

        self.h1 = self.h1.wrapping_add(c32);
        self.h1 = self.h1.wrapping_sub(self.window[slot] as u32);

        self.window[slot] = c;
        self.n += 1;

        self.h3 = self.h3.wrapping_shl(5) ^ c32;

        self.sum()
    }

    fn sum(&self) -> u32 {
        self.h1.wrapping_add(self.h2).wrapping_add(self.h3)
    }
}

#[inline]
fn piece_hash(c: u8, h: u32) -> u32 {
    h.wrapping_mul(HASH_PRIME) ^ (c as u32)
}

/// Compute the digest of `data`
pub fn digest(data: &[u8]) -> String {
    let mut block_size = MIN_BLOCKSIZE;
    while (block_size as usize) * SPAMSUM_LENGTH < data.len() {
        block_size *= 2;
    }

    loop {
        let (d1, d2) = digest_at(data, block_size);
        // Too few pieces at this block size; retry with finer pieces
        if block_size > MIN_BLOCKSIZE && d1.len() < SPAMSUM_LENGTH / 2 {
            block_size /= 2;
            continue;
        }
        return format!("{}:{}:{}", block_size, d1, d2);
    }
}

fn digest_at(data: &[u8], block_size: u32) -> (String, String) {
    let mut roll = RollingHash::new();
    let mut h1 = HASH_INIT;
    let mut h2 = HASH_INIT;
    let mut d1 = String::with_capacity(SPAMSUM_LENGTH);
    let mut d2 = String::with_capacity(SPAMSUM_LENGTH / 2);
    let double = block_size.wrapping_mul(2);

    for &c in data {
        h1 = piece_hash(c, h1);
        h2 = piece_hash(c, h2);
        let r = roll.update(c);

        if r % block_size == block_size - 1 {
            if d1.len() < SPAMSUM_LENGTH - 1 {
                d1.push(B64[(h1 % 64) as usize] as char);
                h1 = HASH_INIT;
            }
            if r % double == double - 1 && d2.len() < SPAMSUM_LENGTH / 2 - 1 {
                d2.push(B64[(h2 % 64) as usize] as char);
                h2 = HASH_INIT;
            }
        }
    }

    if roll.sum() != 0 {
        d1.push(B64[(h1 % 64) as usize] as char);
        d2.push(B64[(h2 % 64) as usize] as char);
    }

    (d1, d2)
}

/// Parsed digest parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDigest<'a> {
    pub block_size: u32,
    pub digest1: &'a str,
    pub digest2: &'a str,
}

/// Split and validate a `blocksize:digest1:digest2` string
pub fn parse_digest(digest: &str) -> Result<ParsedDigest<'_>, FingerprintError> {
    let mut parts = digest.splitn(3, ':');
    let (Some(bs), Some(d1), Some(d2)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(FingerprintError::InvalidDigest(format!(
            "expected blocksize:digest1:digest2, got '{}'",
            digest
        )));
    };

    let block_size: u32 = bs
        .parse()
        .map_err(|_| FingerprintError::InvalidDigest(format!("bad block size '{}'", bs)))?;
    if block_size < MIN_BLOCKSIZE {
        return Err(FingerprintError::InvalidDigest(format!(
            "block size {} below minimum {}",
            block_size, MIN_BLOCKSIZE
        )));
    }

    for part in [d1, d2] {
        if part.len() > SPAMSUM_LENGTH || !part.bytes().all(|b| B64.contains(&b)) {
            return Err(FingerprintError::InvalidDigest(format!(
                "bad digest segment '{}'",
                part
            )));
        }
    }

    Ok(ParsedDigest {
        block_size,
        digest1: d1,
        digest2: d2,
    })
}

/// Compare two digests, returning a score in [0, 100]
///
/// Block sizes must be equal or a factor of two apart, otherwise the
/// digests describe the text at incompatible granularity and score 0.
pub fn compare(a: &str, b: &str) -> Result<u32, FingerprintError> {
    let left = parse_digest(a)?;
    let right = parse_digest(b)?;

    if a == b {
        return Ok(100);
    }

    let (bs1, bs2) = (left.block_size, right.block_size);
    if bs1 != bs2 && bs1 != bs2.saturating_mul(2) && bs2 != bs1.saturating_mul(2) {
        return Ok(0);
    }

    let l1 = collapse_runs(left.digest1);
    let l2 = collapse_runs(left.digest2);
    let r1 = collapse_runs(right.digest1);
    let r2 = collapse_runs(right.digest2);

    let score = if bs1 == bs2 {
        score_strings(&l1, &r1, bs1).max(score_strings(&l2, &r2, bs1.saturating_mul(2)))
    } else if bs1 == bs2.saturating_mul(2) {
        score_strings(&l1, &r2, bs1)
    } else {
        score_strings(&l2, &r1, bs2)
    };

    Ok(score)
}

/// Runs of more than three identical characters carry little information
fn collapse_runs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut run_char = None;
    let mut run_len = 0;

    for c in s.chars() {
        if Some(c) == run_char {
            run_len += 1;
        } else {
            run_char = Some(c);
            run_len = 1;
        }
        if run_len <= 3 {
            out.push(c);
        }
    }
    out
}

fn has_common_substring(s1: &str, s2: &str) -> bool {
    if s1.len() < ROLLING_WINDOW || s2.len() < ROLLING_WINDOW {
        return false;
    }
    let windows: HashSet<&[u8]> = s1.as_bytes().windows(ROLLING_WINDOW).collect();
    s2.as_bytes()
        .windows(ROLLING_WINDOW)
        .any(|w| windows.contains(w))
}

fn score_strings(s1: &str, s2: &str, block_size: u32) -> u32 {
    if s1.is_empty() || s2.is_empty() {
        return 0;
    }
    if !has_common_substring(s1, s2) {
        return 0;
    }

    let len1 = s1.len() as u32;
    let len2 = s2.len() as u32;
    let distance = strsim::levenshtein(s1, s2) as u32;

    let scaled = distance * SPAMSUM_LENGTH as u32 / (len1 + len2);
    let scaled = 100 * scaled / SPAMSUM_LENGTH as u32;
    if scaled >= 100 {
        return 0;
    }
    let mut score = 100 - scaled;

    // Tiny block sizes make short digests match too easily
    let cap_threshold = (99 + ROLLING_WINDOW as u32) / ROLLING_WINDOW as u32 * MIN_BLOCKSIZE;
    if block_size < cap_threshold {
        let cap = block_size / MIN_BLOCKSIZE * len1.min(len2);
        score = score.min(cap);
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-dialogue with enough byte variety to trigger pieces
    fn sample_text(seed: u64, words: usize) -> String {
        const VOCAB: &[&str] = &[
            "captain", "reactor", "signal", "harbor", "detective", "evidence", "tonight",
            "warehouse", "brother", "letter", "storm", "engine", "secret", "doctor",
            "bridge", "market", "shadow", "promise", "window", "train", "river", "money",
        ];
        let mut state = seed;
        let mut out = Vec::with_capacity(words);
        for i in 0..words {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let word = VOCAB[(state >> 33) as usize % VOCAB.len()];
            if i % 9 == 8 {
                out.push(format!("{}.", word));
            } else {
                out.push(word.to_string());
            }
        }
        out.join(" ")
    }

    #[test]
    fn digest_is_deterministic() {
        let text = sample_text(7, 1500);
        assert_eq!(digest(text.as_bytes()), digest(text.as_bytes()));
    }

    #[test]
    fn digest_has_expected_shape() {
        let text = sample_text(11, 1500);
        let d = digest(text.as_bytes());
        let parsed = parse_digest(&d).unwrap();
        assert!(parsed.block_size >= MIN_BLOCKSIZE);
        assert!(parsed.digest1.len() <= SPAMSUM_LENGTH);
        assert!(parsed.digest2.len() <= SPAMSUM_LENGTH / 2);
        assert!(!parsed.digest1.is_empty());
    }

    #[test]
    fn identical_digests_score_100() {
        let d = digest(sample_text(3, 2000).as_bytes());
        assert_eq!(compare(&d, &d).unwrap(), 100);
    }

    #[test]
    fn small_edit_keeps_high_score() {
        let original = sample_text(5, 3000);
        let mut edited = original.clone();
        let mid = edited.len() / 2;
        let at = edited[mid..].find(' ').map(|p| mid + p).unwrap();
        edited.insert_str(at, " unexpectedly");

        let score = compare(
            &digest(original.as_bytes()),
            &digest(edited.as_bytes()),
        )
        .unwrap();
        assert!(score >= 80, "score was {}", score);
    }

    #[test]
    fn unrelated_texts_score_low() {
        let a = digest(sample_text(1, 3000).as_bytes());
        let b = digest(sample_text(999, 3000).as_bytes());
        assert!(compare(&a, &b).unwrap() < 30);
    }

    #[test]
    fn incompatible_block_sizes_score_zero() {
        assert_eq!(compare("3:ABCDEFGHIJ:ABCDE", "48:ABCDEFGHIJ:ABCDE").unwrap(), 0);
    }

    #[test]
    fn collapse_runs_keeps_three() {
        assert_eq!(collapse_runs("aaaaab"), "aaab");
        assert_eq!(collapse_runs("abc"), "abc");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_digest("abc").is_err());
        assert!(parse_digest("x:abc:abc").is_err());
        assert!(parse_digest("1:abc:abc").is_err());
        assert!(parse_digest("3:ab!c:abc").is_err());
    }
}
