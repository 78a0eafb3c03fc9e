//! Sentence reconstruction and token cleanup.

use std::collections::HashMap;

use label_core::{LabelError, LabelResult};
use regex::{Captures, Regex};

/// ASCII punctuation. Tokens contained in it attach to the previous word.
const PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Punctuation tokens that still get a leading space.
const SPACED_PUNCTUATION: [&str; 2] = ["-", "("];

/// Join word-level tokens into a readable sentence.
///
/// Words are separated by single spaces, except punctuation which is glued
/// to the preceding word. Apostrophes attach backwards and an opening
/// parenthesis attaches forwards.
pub fn get_sentence<S: AsRef<str>>(words: &[S]) -> String {
    let mut sentence = String::new();
    for word in words {
        let word = word.as_ref();
        if !PUNCTUATION.contains(word) || SPACED_PUNCTUATION.contains(&word) {
            sentence.push(' ');
        }
        sentence.push_str(word);
    }
    sentence
        .replace(" '", "'")
        .replace("( ", "(")
        .trim()
        .to_string()
}

/// Default sentence filter: longer than one character and free of `#`.
pub fn default_sentence_filter(sentence: &str) -> bool {
    sentence.chars().count() > 1 && !sentence.contains('#')
}

/// Keep the sentences for which `condition` holds.
///
/// Returns the kept sentences and a mask with `mask[i] == true` when sentence
/// `i` was kept.
pub fn filter_sentence<S, F>(sentences: &[S], condition: F) -> (Vec<String>, Vec<bool>)
where
    S: AsRef<str>,
    F: Fn(&str) -> bool,
{
    let mask: Vec<bool> = sentences.iter().map(|s| condition(s.as_ref())).collect();
    let kept = sentences
        .iter()
        .zip(&mask)
        .filter(|(_, keep)| **keep)
        .map(|(s, _)| s.as_ref().to_string())
        .collect();
    (kept, mask)
}

/// Replace substrings of `token` according to `(from, to)` pairs.
///
/// All replacements are applied in one pass over the original token, so the
/// output of one pair is never rewritten by another. Earlier pairs win when
/// two patterns match at the same position.
pub fn process_token(token: &str, replace: &[(&str, &str)]) -> LabelResult<String> {
    let replace: Vec<&(&str, &str)> = replace.iter().filter(|(from, _)| !from.is_empty()).collect();
    if replace.is_empty() {
        return Ok(token.to_string());
    }

    let lookup: HashMap<&str, &str> = replace.iter().map(|(from, to)| (*from, *to)).collect();
    let pattern = replace
        .iter()
        .map(|(from, _)| regex::escape(from))
        .collect::<Vec<_>>()
        .join("|");
    let compiled = Regex::new(&pattern)
        .map_err(|e| LabelError::InvalidConfig(format!("token replacement pattern: {}", e)))?;

    Ok(compiled
        .replace_all(token, |caps: &Captures| {
            lookup.get(&caps[0]).copied().unwrap_or_default().to_string()
        })
        .into_owned())
}

/// Strip `#` from a token, the usual cleanup for sub-word markers.
pub fn strip_hashes(token: &str) -> LabelResult<String> {
    process_token(token, &[("#", "")])
}
