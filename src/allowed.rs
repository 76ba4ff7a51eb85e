use std::collections::BTreeSet;

use crate::text::{canonical, is_blank};
use crate::{AnswerKey, ParseResult};

/// Canonical answer tokens derived from one answer key, synonyms included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedSet {
    tokens: BTreeSet<String>,
}

impl AllowedSet {
    /// True when the canonical form of `answer` is one of the key's tokens.
    pub fn contains(&self, answer: &str) -> bool {
        !is_blank(answer) && self.tokens.contains(&canonical(answer))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Build the allowed set for `key`: every canonicalized expected answer,
/// its plain uppercase spelling, and the short form of the true/false and
/// yes/no families.
pub fn build_allowed_set(key: &AnswerKey) -> AllowedSet {
    let mut tokens = BTreeSet::new();
    for answer in key.values() {
        if is_blank(answer) {
            continue;
        }
        let canon = canonical(answer);
        let upper = answer.trim().to_uppercase();
        if upper != canon {
            tokens.insert(upper);
        }
        if let Some(short) = short_form(&canon) {
            tokens.insert(short.to_string());
        }
        tokens.insert(canon);
    }
    AllowedSet { tokens }
}

fn short_form(canon: &str) -> Option<&'static str> {
    match canon {
        "TRUE" => Some("T"),
        "FALSE" => Some("F"),
        "YES" => Some("Y"),
        "NO" => Some("N"),
        _ => None,
    }
}

/// Record `answer` for `question` unless an earlier answer should stand.
///
/// First non-blank answer wins. A later one only replaces it when the later
/// answer is in the allowed set and the earlier one is not. Answers are
/// stored as written, never canonicalized. Returns whether `answer` was stored.
pub fn insert_preferring_allowed(
    result: &mut ParseResult,
    question: u32,
    answer: String,
    allowed: &AllowedSet,
) -> bool {
    let replace = match result.get(question) {
        None => true,
        Some(existing) if is_blank(existing) => !is_blank(&answer),
        Some(existing) => allowed.contains(&answer) && !allowed.contains(existing),
    };
    if replace {
        result.insert(question, answer);
    }
    replace
}
