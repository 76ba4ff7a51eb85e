use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::MAX_ANSWER_LEN;

static NOISE_GLYPHS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u2022\u00B7\u2013\u2014_]+").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
// Roman marker at line start, followed by punctuation, horizontal space or end of line.
static ROMAN_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?mi)^([ \t]*)([ivx]{1,6})([.):]|[ \t]|$)").unwrap());
// A 1-3 digit number followed (modulo punctuation) by a letter: start of a fused item.
static ITEM_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,3}[ \t]*[.):\-]?[ \t]*[A-Za-z]").unwrap());

const ROMAN_NUMERALS: [&str; 30] = [
    "I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X",
    "XI", "XII", "XIII", "XIV", "XV", "XVI", "XVII", "XVIII", "XIX", "XX",
    "XXI", "XXII", "XXIII", "XXIV", "XXV", "XXVI", "XXVII", "XXVIII", "XXIX", "XXX",
];

/// Unify line breaks and blank out noise glyphs (bullets, middle dots,
/// en/em dashes, underscores). Line boundaries are kept.
pub fn normalize_preserving_lines(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    NOISE_GLYPHS.replace_all(&unified, " ").into_owned()
}

/// Same as [`normalize_preserving_lines`], then collapse every whitespace run
/// (newlines included) into a single space.
pub fn normalize_collapsing(text: &str) -> String {
    let kept = normalize_preserving_lines(text);
    WHITESPACE_RUN.replace_all(&kept, " ").trim().to_string()
}

/// Value of a Roman numeral in I..=XXX, case-insensitive.
pub fn roman_value(token: &str) -> Option<u32> {
    let upper = token.to_ascii_uppercase();
    ROMAN_NUMERALS
        .iter()
        .position(|r| *r == upper)
        .map(|i| i as u32 + 1)
}

/// Rewrite line-leading Roman question markers (`II)`, `iv.`, `X `) into
/// Arabic digits. Punctuation and whitespace around the marker are kept
/// verbatim; tokens without a value in I..=XXX are left alone.
pub fn convert_roman_markers(text: &str) -> String {
    ROMAN_MARKER
        .replace_all(text, |caps: &Captures| match roman_value(&caps[2]) {
            Some(n) => format!("{}{}{}", &caps[1], n, &caps[3]),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Split a line that fused several `number.answer` items (`1.A2.B3.C`)
/// into trimmed segments. A line without such a boundary comes back as a
/// single segment; a blank line yields none.
pub fn split_compressed(line: &str) -> Vec<String> {
    let mut bounds = vec![0];
    bounds.extend(
        ITEM_START
            .find_iter(line)
            .map(|m| m.start())
            .filter(|&at| is_item_boundary(line, at)),
    );
    bounds.push(line.len());

    bounds
        .windows(2)
        .map(|w| line[w[0]..w[1]].trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_item_boundary(line: &str, at: usize) -> bool {
    let before = &line[..at];
    // never cut inside a longer number
    if before.ends_with(|c: char| c.is_ascii_digit()) {
        return false;
    }
    before
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '.' | ')' | ':' | ';' | ',' | '-'))
        .chars()
        .next_back()
        .map_or(false, char::is_alphanumeric)
}

/// Trim an extracted answer token: surrounding whitespace, trailing sentence
/// punctuation, and anything past `MAX_ANSWER_LEN` characters.
pub fn clean_answer(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'));
    let capped: String = trimmed.chars().take(MAX_ANSWER_LEN).collect();
    capped.trim().to_string()
}

pub fn first_word(text: &str) -> Option<&str> {
    text.split_whitespace().next()
}

/// Uppercase comparison form of an answer; T/F/Y/N expand to their words.
pub fn canonical(answer: &str) -> String {
    let upper = answer.trim().to_uppercase();
    match upper.as_str() {
        "T" => "TRUE".to_string(),
        "F" => "FALSE".to_string(),
        "Y" => "YES".to_string(),
        "N" => "NO".to_string(),
        _ => upper,
    }
}

pub fn is_blank(answer: &str) -> bool {
    answer.trim().is_empty()
}
