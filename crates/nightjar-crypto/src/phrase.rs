//! Recovery phrase generation and strength validation
//!
//! Generated phrases sample the BIP-39 English wordlist (2048 words, 11 bits
//! per word) without replacement. Custom phrases are accepted if they carry
//! at least 6 words and an estimated 50 bits of entropy; 70 bits rates as
//! strong. The estimate is deliberately conservative: repeated words count
//! once, and words outside the wordlist are scored by length.

use rand::Rng;

use nightjar_core::RecoveryError;

use crate::kdf::normalize_phrase;

/// Words in a generated phrase. Seven wordlist words carry ~77 bits.
pub const GENERATED_WORD_COUNT: usize = 7;

const MIN_WORDS: usize = 6;
const MIN_ENTROPY_BITS: f64 = 50.0;
const STRONG_ENTROPY_BITS: f64 = 70.0;

/// Bits contributed by one wordlist word (log2 of 2048).
const WORDLIST_BITS: f64 = 11.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseStrength {
    /// Meets the minimum bar (>= 6 words, >= 50 bits)
    Acceptable,
    /// Comfortably strong (>= 70 bits)
    Strong,
}

/// Generate a fresh recovery phrase from the wordlist.
pub fn generate_phrase(word_count: usize) -> String {
    let words = bip39::Language::English.word_list();
    let mut rng = rand::thread_rng();

    let mut picked: Vec<&str> = Vec::with_capacity(word_count);
    while picked.len() < word_count {
        let word = words[rng.gen_range(0..words.len())];
        if !picked.contains(&word) {
            picked.push(word);
        }
    }
    picked.join(" ")
}

/// Conservative entropy estimate for a phrase, in bits.
///
/// Repeated words are counted once. Wordlist words score 11 bits; unknown
/// words score by length, capped at the wordlist rate.
pub fn estimate_entropy_bits(phrase: &str) -> f64 {
    let normalized = normalize_phrase(phrase);
    let words = bip39::Language::English.word_list();

    let mut seen: Vec<&str> = Vec::new();
    let mut bits = 0.0;
    for word in normalized.split(' ').filter(|w| !w.is_empty()) {
        if seen.contains(&word) {
            continue;
        }
        seen.push(word);
        if words.iter().any(|w| *w == word) {
            bits += WORDLIST_BITS;
        } else {
            bits += (4.0 + 1.5 * word.len() as f64).min(WORDLIST_BITS);
        }
    }
    bits
}

/// Validate a candidate phrase for use as a recovery or share phrase.
pub fn validate_phrase(phrase: &str) -> Result<PhraseStrength, RecoveryError> {
    let normalized = normalize_phrase(phrase);
    let word_count = normalized.split(' ').filter(|w| !w.is_empty()).count();

    if word_count < MIN_WORDS {
        return Err(RecoveryError::WeakPhrase(format!(
            "{word_count} words, need at least {MIN_WORDS}"
        )));
    }

    let bits = estimate_entropy_bits(&normalized);
    if bits < MIN_ENTROPY_BITS {
        return Err(RecoveryError::WeakPhrase(format!(
            "estimated {bits:.0} bits of entropy, need at least {MIN_ENTROPY_BITS:.0}"
        )));
    }

    if bits >= STRONG_ENTROPY_BITS {
        Ok(PhraseStrength::Strong)
    } else {
        Ok(PhraseStrength::Acceptable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_phrase_is_strong() {
        let phrase = generate_phrase(GENERATED_WORD_COUNT);
        assert_eq!(phrase.split(' ').count(), GENERATED_WORD_COUNT);
        assert_eq!(validate_phrase(&phrase).unwrap(), PhraseStrength::Strong);
    }

    #[test]
    fn test_generated_phrases_differ() {
        assert_ne!(
            generate_phrase(GENERATED_WORD_COUNT),
            generate_phrase(GENERATED_WORD_COUNT)
        );
    }

    #[test]
    fn test_single_word_rejected() {
        assert!(matches!(
            validate_phrase("cat"),
            Err(RecoveryError::WeakPhrase(_))
        ));
    }

    #[test]
    fn test_repeated_words_rejected() {
        // Six words but only one unique: far below the entropy floor.
        assert!(matches!(
            validate_phrase("cat cat cat cat cat cat"),
            Err(RecoveryError::WeakPhrase(_))
        ));
    }

    #[test]
    fn test_distinct_uncommon_words_accepted() {
        let phrase = "seven distinct uncommon words chosen randomly now";
        assert!(validate_phrase(phrase).is_ok());
    }

    #[test]
    fn test_entropy_counts_unique_words_once() {
        let once = estimate_entropy_bits("orbit lumber");
        let repeated = estimate_entropy_bits("orbit lumber orbit lumber");
        assert_eq!(once, repeated);
    }

    #[test]
    fn test_entropy_case_insensitive() {
        assert_eq!(
            estimate_entropy_bits("Orbit Lumber Quiet"),
            estimate_entropy_bits("orbit lumber quiet")
        );
    }

    #[test]
    fn test_wordlist_words_score_full_rate() {
        // "abandon" is the first BIP-39 word
        assert_eq!(estimate_entropy_bits("abandon"), 11.0);
    }
}
