//! Candidate extractors.
//!
//! Each extractor is a pure function of the transcript and the answer key and
//! returns its own partial question -> answer map. They share no state, so the
//! orchestrator can run them in any order.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::allowed::{build_allowed_set, insert_preferring_allowed, AllowedSet};
use crate::text::{
    clean_answer, convert_roman_markers, first_word, normalize_collapsing, normalize_preserving_lines,
    split_compressed,
};
use crate::{AnswerKey, ParseResult, Strategy, MAX_QUESTION};

/// `N<punct>?<sep>?TOKEN`: `1. A`, `2)B`, `3 - C`, `4: D`.
pub static NUMBER_FIRST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{1,3})\s*[.):]?\s*[-:]?\s*([A-Za-z]\w{0,39})").unwrap());
/// `TOKEN<sep>N<punct>?` closing the segment: `True 1.`. Tokens of any
/// length match; `clean_answer` caps them.
pub static ANSWER_FIRST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Za-z]\w*)\s+(\d{1,3})\s*[.):]?\s*$").unwrap());
/// Answer-first shape without the end anchor, used by the key-restricted pass.
pub static ANSWER_FIRST_LOOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Za-z]\w*)\s+(\d{1,3})\s*[.):]?").unwrap());
/// A number with nothing after it: `5.` or `7`.
pub static NUMBER_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d{1,3})\s*[.):]?\s*[-:]?\s*$").unwrap());
/// A lone answer token: `C`, `Apple.`.
pub static ANSWER_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([A-Za-z]\w*)[.,;!?]*\s*$").unwrap());
/// `number<punct><sep>` prefix; group 2 is the rest of the line.
pub static NUMBER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{1,3})(?:\s*[.):]\s*|\s+|$)[-:]?\s*(.*)$").unwrap());
/// Numbering token the order-only pass strips before reading the answer.
pub static LEADING_NUMBERING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d{1,3}\s*[.):]?\s*[-:]?\s*").unwrap());

// Inline patterns of the unkeyed parse, applied in order over collapsed text.
static UNKEYED_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"(?m)^\s*(\d{1,3})\s*[.):]?\s*[-:]?\s*([A-Za-z]\w*)").unwrap(),
        Regex::new(r"(\d{1,3})\s*[.):]\s*[-:]?\s*([A-Za-z]\w{0,39})").unwrap(),
        Regex::new(r"(\d{1,3})\s+([A-Z])\b").unwrap(),
    ]
});

/// Question number paired with the answer text read for it, tagged with the
/// pass that read it. Candidates are merged into a `ParseResult` and never
/// leave the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub question: u32,
    pub answer: String,
    pub strategy: Strategy,
}

/// A question number seen without an adjacent answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingNumber(pub u32);

/// What one segment looks like to the number-anchored pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentMatch {
    NumberFirst(Candidate),
    AnswerFirst(Candidate),
    NumberOnly(u32),
    AnswerOnly(String),
    Unmatched,
}

/// Parse a question number, keeping it only inside `1..=MAX_QUESTION`.
pub fn valid_question(digits: &str) -> Option<u32> {
    digits
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|q| (1..=MAX_QUESTION).contains(q))
}

fn capture_pair(
    re: &Regex,
    text: &str,
    number_group: usize,
    answer_group: usize,
    strategy: Strategy,
) -> Option<Candidate> {
    let caps = re.captures(text)?;
    let question = valid_question(caps.get(number_group)?.as_str())?;
    let answer = clean_answer(caps.get(answer_group)?.as_str());
    if answer.is_empty() {
        return None;
    }
    Some(Candidate { question, answer, strategy })
}

/// Try number-first, answer-first, number-only, answer-only in that order.
/// A pattern whose number is out of range does not count as a match.
pub fn classify_segment(segment: &str) -> SegmentMatch {
    if let Some(found) = capture_pair(&NUMBER_FIRST, segment, 1, 2, Strategy::NumberAnchored) {
        return SegmentMatch::NumberFirst(found);
    }
    if let Some(found) = capture_pair(&ANSWER_FIRST, segment, 2, 1, Strategy::NumberAnchored) {
        return SegmentMatch::AnswerFirst(found);
    }
    if let Some(question) = NUMBER_ONLY.captures(segment).and_then(|c| valid_question(&c[1])) {
        return SegmentMatch::NumberOnly(question);
    }
    if let Some(caps) = ANSWER_ONLY.captures(segment) {
        let answer = clean_answer(&caps[1]);
        if !answer.is_empty() {
            return SegmentMatch::AnswerOnly(answer);
        }
    }
    SegmentMatch::Unmatched
}

/// Pending-number transition for one segment.
///
/// An explicit pairing always clears the pending number. A bare number
/// replaces it. A bare answer consumes it. Anything else leaves it as is.
pub fn pair_step(pending: Option<PendingNumber>, segment: &str) -> (Option<PendingNumber>, Option<Candidate>) {
    match classify_segment(segment) {
        SegmentMatch::NumberFirst(found) | SegmentMatch::AnswerFirst(found) => (None, Some(found)),
        SegmentMatch::NumberOnly(question) => (Some(PendingNumber(question)), None),
        SegmentMatch::AnswerOnly(answer) => match pending {
            Some(PendingNumber(question)) => {
                let strategy = Strategy::NumberAnchored;
                (None, Some(Candidate { question, answer, strategy }))
            }
            None => (None, None),
        },
        SegmentMatch::Unmatched => (pending, None),
    }
}

fn prepare_lines(text: &str) -> String {
    convert_roman_markers(&normalize_preserving_lines(text))
}

fn collect_candidates(candidates: impl IntoIterator<Item = Candidate>, allowed: &AllowedSet) -> ParseResult {
    let mut result = ParseResult::new();
    for found in candidates {
        insert_preferring_allowed(&mut result, found.question, found.answer, allowed);
    }
    result
}

/// Most tolerant pass: compressed-line splitting, answer-first items and
/// numbers paired with an answer on a later line.
pub fn extract_number_anchored(text: &str, key: &AnswerKey) -> ParseResult {
    let allowed = build_allowed_set(key);
    let prepared = prepare_lines(text);
    let (_, candidates) = prepared.lines().flat_map(split_compressed).fold(
        (None, Vec::<Candidate>::new()),
        |(pending, mut found), segment| {
            let (next, paired) = pair_step(pending, &segment);
            found.extend(paired);
            (next, found)
        },
    );
    collect_candidates(candidates, &allowed)
}

/// Numbered items first, then unnumbered allowed-set tokens ("orphans") fill
/// the remaining key questions in document order. Always returns one entry
/// per key question; unfilled ones are empty strings.
pub fn extract_gap_tolerant(text: &str, key: &AnswerKey) -> ParseResult {
    let allowed = build_allowed_set(key);
    let prepared = prepare_lines(text);
    let mut by_number = ParseResult::new();
    let mut orphans: Vec<String> = Vec::new();

    for segment in prepared.lines().flat_map(split_compressed) {
        match NUMBER_PREFIX.captures(&segment) {
            Some(caps) => {
                let token = caps
                    .get(2)
                    .and_then(|rest| first_word(rest.as_str()))
                    .map(clean_answer)
                    .unwrap_or_default();
                let live = valid_question(&caps[1]).filter(|q| key.contains_key(q) && !by_number.contains(*q));
                match live {
                    Some(question) if !token.is_empty() => by_number.insert(question, token),
                    _ => push_orphan(&mut orphans, token, &allowed),
                }
            }
            None => {
                let token = first_word(&segment).map(clean_answer).unwrap_or_default();
                push_orphan(&mut orphans, token, &allowed);
            }
        }
    }

    let mut orphans = orphans.into_iter();
    key.keys()
        .map(|&question| {
            let answer = match by_number.get(question) {
                Some(answer) => answer.to_string(),
                None => orphans.next().unwrap_or_default(),
            };
            (question, answer)
        })
        .collect()
}

fn push_orphan(orphans: &mut Vec<String>, token: String, allowed: &AllowedSet) {
    if !token.is_empty() && allowed.contains(&token) {
        orphans.push(token);
    }
}

/// Line-leading `number<punct><sep>token` only.
pub fn extract_number_aware(text: &str, key: &AnswerKey) -> ParseResult {
    let allowed = build_allowed_set(key);
    let prepared = prepare_lines(text);
    let candidates = prepared
        .lines()
        .filter_map(|line| capture_pair(&NUMBER_FIRST, line, 1, 2, Strategy::NumberAware));
    collect_candidates(candidates, &allowed)
}

/// Ignore numbering; the i-th allowed-set token goes to the i-th key question.
pub fn extract_order_only(text: &str, key: &AnswerKey) -> ParseResult {
    let allowed = build_allowed_set(key);
    let prepared = prepare_lines(text);
    let tokens = prepared
        .lines()
        .filter_map(|line| {
            let rest = LEADING_NUMBERING.replace(line, "");
            first_word(&rest).map(clean_answer)
        })
        .filter(|token| allowed.contains(token));
    key.keys().copied().zip(tokens).collect()
}

/// Number-first and answer-first lines, accepting only allowed-set tokens.
pub fn extract_answer_key_restricted(text: &str, key: &AnswerKey) -> ParseResult {
    let mut result = ParseResult::new();
    if key.is_empty() {
        return result;
    }
    let allowed = build_allowed_set(key);
    let accept = |found: &Candidate, result: &ParseResult| {
        allowed.contains(&found.answer) && !result.contains(found.question)
    };

    for line in prepare_lines(text).lines() {
        if line.trim().is_empty() {
            continue;
        }
        let number_first = capture_pair(&NUMBER_FIRST, line, 1, 2, Strategy::AnswerKeyRestricted)
            .filter(|found| accept(found, &result));
        if let Some(found) = number_first {
            result.insert(found.question, found.answer);
            continue;
        }
        let answer_first = capture_pair(&ANSWER_FIRST_LOOSE, line, 2, 1, Strategy::AnswerKeyRestricted)
            .filter(|found| accept(found, &result));
        if let Some(found) = answer_first {
            result.insert(found.question, found.answer);
        }
    }
    result
}

/// Parse without an answer key. Works on whitespace-collapsed text; the
/// first match per question wins and single letters are uppercased.
pub fn extract_unkeyed(text: &str) -> ParseResult {
    let mut result = ParseResult::new();
    if text.trim().is_empty() {
        return result;
    }
    let prepared = convert_roman_markers(&normalize_collapsing(text));
    for pattern in UNKEYED_PATTERNS.iter() {
        for caps in pattern.captures_iter(&prepared) {
            let Some(question) = valid_question(&caps[1]) else { continue };
            let mut answer = clean_answer(&caps[2]);
            if answer.is_empty() || result.contains(question) {
                continue;
            }
            if answer.chars().count() == 1 {
                answer = answer.to_uppercase();
            }
            result.insert(question, answer);
        }
    }
    result
}
