use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use globwalk::GlobWalkerBuilder;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod allowed;
pub mod extract;
pub mod text;

pub use allowed::{build_allowed_set, AllowedSet};
pub use extract::{
    extract_answer_key_restricted, extract_gap_tolerant, extract_number_anchored, extract_number_aware,
    extract_order_only, extract_unkeyed,
};

use text::is_blank;

/// Highest question number a sheet may carry.
pub const MAX_QUESTION: u32 = 200;
/// Longest answer text kept, in characters.
pub const MAX_ANSWER_LEN: usize = 40;
/// Below this fill ratio the orchestrator also tries the order-only pass.
pub const FALLBACK_THRESHOLD: f64 = 0.3;
/// Variant selection stops once a transcript fills this share of the key.
pub const EARLY_EXIT_FILL_RATIO: f64 = 0.7;
pub const SCORE_PER_FILLED_ANSWER: u32 = 10;
pub const SCORE_NUMERIC_ANCHOR_BONUS: u32 = 2;

/// Question number -> expected answer, ascending by question.
pub type AnswerKey = BTreeMap<u32, String>;

/// Question number -> extracted answer text, in insertion order.
///
/// An empty string and a missing question both mean "unanswered".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseResult {
    entries: Vec<(u32, String)>,
}

impl ParseResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (u32, S)>) -> Self {
        pairs.into_iter().map(|(q, a)| (q, a.into())).collect()
    }

    pub fn get(&self, question: u32) -> Option<&str> {
        self.entries
            .iter()
            .find(|(q, _)| *q == question)
            .map(|(_, a)| a.as_str())
    }

    pub fn contains(&self, question: u32) -> bool {
        self.entries.iter().any(|(q, _)| *q == question)
    }

    /// Set the answer for `question`. An existing entry keeps its position.
    pub fn insert(&mut self, question: u32, answer: impl Into<String>) {
        let answer = answer.into();
        match self.entries.iter_mut().find(|(q, _)| *q == question) {
            Some(slot) => slot.1 = answer,
            None => self.entries.push((question, answer)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.entries.iter().map(|(q, a)| (*q, a.as_str()))
    }

    pub fn questions(&self) -> Vec<u32> {
        self.entries.iter().map(|(q, _)| *q).collect()
    }
}

impl FromIterator<(u32, String)> for ParseResult {
    fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
        let mut result = ParseResult::new();
        for (question, answer) in iter {
            result.insert(question, answer);
        }
        result
    }
}

impl Serialize for ParseResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (question, answer) in &self.entries {
            map.serialize_entry(question, answer)?;
        }
        map.end()
    }
}

/// Extraction strategies, each a pure `(text, key) -> ParseResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    NumberAnchored,
    GapTolerant,
    NumberAware,
    OrderOnly,
    AnswerKeyRestricted,
}

impl Strategy {
    /// Strategies always run by the fallback ladder, in tie-break order.
    pub const LADDER: [Strategy; 3] = [Strategy::NumberAnchored, Strategy::GapTolerant, Strategy::NumberAware];

    pub fn extract(self, text: &str, key: &AnswerKey) -> ParseResult {
        match self {
            Strategy::NumberAnchored => extract_number_anchored(text, key),
            Strategy::GapTolerant => extract_gap_tolerant(text, key),
            Strategy::NumberAware => extract_number_aware(text, key),
            Strategy::OrderOnly => extract_order_only(text, key),
            Strategy::AnswerKeyRestricted => extract_answer_key_restricted(text, key),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Number-anchored / gap-tolerant / number-aware, then order-only.
    #[default]
    Fallback,
    /// Answer-key-restricted pass, shaped to the key.
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParserConfig {
    pub fallback_threshold: f64,
    pub early_exit_fill_ratio: f64,
    pub mode: ParseMode,
    pub input_glob: Option<String>,
    pub output_dir: Option<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            fallback_threshold: FALLBACK_THRESHOLD,
            early_exit_fill_ratio: EARLY_EXIT_FILL_RATIO,
            mode: ParseMode::Fallback,
            input_glob: None,
            output_dir: None,
        }
    }
}

impl ParserConfig {
    pub fn input_glob(&self) -> String {
        self.input_glob
            .clone()
            .unwrap_or_else(|| "./transcripts/**/*.txt".to_string())
    }
    pub fn output_dir(&self) -> String {
        self.output_dir.clone().unwrap_or_else(|| "./output".to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(String),
    #[error("Failed to parse config: {0}")]
    Parse(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load and validate a YAML parser config.
pub fn load_config(path: &Path) -> Result<ParserConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
    let cfg: ParserConfig = if raw.trim().is_empty() {
        ParserConfig::default()
    } else {
        serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?
    };
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn validate_config(cfg: &ParserConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("fallback_threshold", cfg.fallback_threshold),
        ("early_exit_fill_ratio", cfg.early_exit_fill_ratio),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Invalid(format!("{} must be within [0, 1], got {}", name, value)));
        }
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum AnswerKeyError {
    #[error("Failed to read answer key: {0}")]
    Read(String),
    #[error("Failed to parse answer key: {0}")]
    Parse(String),
    #[error("Invalid answer key: {0}")]
    Invalid(String),
}

/// Read an answer key file (YAML or JSON mapping of question -> answer).
pub fn load_answer_key(path: &Path) -> Result<AnswerKey, AnswerKeyError> {
    let raw = std::fs::read_to_string(path).map_err(|e| AnswerKeyError::Read(e.to_string()))?;
    parse_answer_key(&raw)
}

/// Parse and validate answer key text. Question numbers must be unique and
/// within `1..=MAX_QUESTION`; answers are 1 to `MAX_ANSWER_LEN` characters.
pub fn parse_answer_key(raw: &str) -> Result<AnswerKey, AnswerKeyError> {
    let mut key = AnswerKey::new();
    if raw.trim().is_empty() {
        return Ok(key);
    }
    let mapping: serde_yaml::Mapping = serde_yaml::from_str(raw).map_err(|e| AnswerKeyError::Parse(e.to_string()))?;
    for (number, expected) in mapping.iter() {
        let question = yaml_question(number)
            .ok_or_else(|| AnswerKeyError::Invalid(format!("bad question number {:?}", number)))?;
        let answer = yaml_answer(expected)
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty() && a.chars().count() <= MAX_ANSWER_LEN)
            .ok_or_else(|| AnswerKeyError::Invalid(format!("bad answer for question {}", question)))?;
        if key.insert(question, answer).is_some() {
            return Err(AnswerKeyError::Invalid(format!("duplicate question {}", question)));
        }
    }
    Ok(key)
}

fn yaml_question(value: &serde_yaml::Value) -> Option<u32> {
    let n = match value {
        serde_yaml::Value::Number(n) => n.as_u64()?,
        serde_yaml::Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u32::try_from(n).ok().filter(|q| (1..=MAX_QUESTION).contains(q))
}

fn yaml_answer(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        // unquoted True/False in YAML
        serde_yaml::Value::Bool(true) => Some("True".to_string()),
        serde_yaml::Value::Bool(false) => Some("False".to_string()),
        _ => None,
    }
}

/// Number of non-blank answers.
pub fn filled_count(result: &ParseResult) -> usize {
    result.iter().filter(|(_, a)| !is_blank(a)).count()
}

/// Share of key questions with a non-blank answer in `result`.
pub fn fill_ratio(result: &ParseResult, key: &AnswerKey) -> f64 {
    if key.is_empty() {
        return 0.0;
    }
    let filled = key
        .keys()
        .filter(|q| result.get(**q).map_or(false, |a| !is_blank(a)))
        .count();
    filled as f64 / key.len() as f64
}

/// Highest filled count wins; on ties the earliest entry stays.
pub fn pick_best(candidates: impl IntoIterator<Item = (Strategy, ParseResult)>) -> Option<(Strategy, ParseResult)> {
    let mut best: Option<(Strategy, ParseResult, usize)> = None;
    for (strategy, result) in candidates {
        let filled = filled_count(&result);
        if best.as_ref().map_or(true, |(_, _, top)| filled > *top) {
            best = Some((strategy, result, filled));
        }
    }
    best.map(|(strategy, result, _)| (strategy, result))
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StrategyFill {
    pub strategy: Strategy,
    pub filled: usize,
}

/// How a result was chosen.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ParseReport {
    pub mode: ParseMode,
    pub key_size: usize,
    pub fills: Vec<StrategyFill>,
    pub winner: Option<Strategy>,
    pub order_only_tried: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Resolution {
    pub answers: ParseResult,
    pub report: ParseReport,
}

/// Run the configured extraction and keep the single best result.
///
/// Empty text or an empty key is not an error. Fallback mode returns an
/// empty result; strict mode returns one blank entry per key question.
pub fn resolve(text: &str, key: &AnswerKey, cfg: &ParserConfig) -> Resolution {
    let mut report = ParseReport {
        mode: cfg.mode,
        key_size: key.len(),
        fills: Vec::new(),
        winner: None,
        order_only_tried: false,
    };
    if cfg.mode == ParseMode::Strict {
        let strategy = Strategy::AnswerKeyRestricted;
        let answers = filter_to_answer_key(&strategy.extract(text, key), key);
        report.fills.push(StrategyFill { strategy, filled: filled_count(&answers) });
        report.winner = Some(strategy);
        return Resolution { answers, report };
    }

    if text.trim().is_empty() || key.is_empty() {
        return Resolution { answers: ParseResult::new(), report };
    }

    let results: Vec<(Strategy, ParseResult)> = Strategy::LADDER
        .iter()
        .map(|&strategy| (strategy, strategy.extract(text, key)))
        .collect();
    report.fills = results
        .iter()
        .map(|(strategy, result)| StrategyFill { strategy: *strategy, filled: filled_count(result) })
        .collect();

    let Some((mut winner, mut best)) = pick_best(results) else {
        return Resolution { answers: ParseResult::new(), report };
    };

    let best_filled = filled_count(&best);
    if (best_filled as f64) < cfg.fallback_threshold * key.len() as f64 {
        report.order_only_tried = true;
        let fallback = Strategy::OrderOnly.extract(text, key);
        let fallback_filled = filled_count(&fallback);
        report.fills.push(StrategyFill { strategy: Strategy::OrderOnly, filled: fallback_filled });
        if fallback_filled > best_filled {
            winner = Strategy::OrderOnly;
            best = fallback;
        }
    }

    report.winner = Some(winner);
    Resolution { answers: best, report }
}

/// Parse a transcript against an answer key with the default fallback ladder.
pub fn parse(text: &str, key: &AnswerKey) -> ParseResult {
    resolve(text, key, &ParserConfig::default()).answers
}

/// Answer-key-restricted pass shaped to exactly the key's questions.
pub fn parse_strict(text: &str, key: &AnswerKey) -> ParseResult {
    let cfg = ParserConfig { mode: ParseMode::Strict, ..ParserConfig::default() };
    resolve(text, key, &cfg).answers
}

/// Parse without an answer key.
pub fn parse_unkeyed(text: &str) -> ParseResult {
    extract_unkeyed(text)
}

/// One entry per key question, ascending, with `""` where `parsed` has none.
pub fn filter_to_answer_key(parsed: &ParseResult, key: &AnswerKey) -> ParseResult {
    key.keys()
        .map(|&question| (question, parsed.get(question).unwrap_or("").to_string()))
        .collect()
}

static NUMERIC_ANCHOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+[.)]").unwrap());

/// Score a parsed transcript: points per filled key question plus a small
/// bonus when the text carries numbering like `1.` or `2)`.
pub fn score_variant(parsed: &ParseResult, text: &str, key: &AnswerKey) -> u32 {
    let filled = parsed
        .iter()
        .filter(|(q, a)| key.contains_key(q) && !is_blank(a))
        .count() as u32;
    let mut score = filled * SCORE_PER_FILLED_ANSWER;
    if NUMERIC_ANCHOR.is_match(text) {
        score += SCORE_NUMERIC_ANCHOR_BONUS;
    }
    score
}

/// One transcript of a sheet, e.g. from a differently preprocessed image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VariantChoice {
    pub name: String,
    pub answers: ParseResult,
    pub score: u32,
    pub fill_ratio: f64,
    pub evaluated: usize,
}

/// Parse every variant and keep the best-scoring one (first wins ties).
/// Stops early once a variant reaches `cfg.early_exit_fill_ratio`.
pub fn select_best_variant(variants: &[Variant], key: &AnswerKey, cfg: &ParserConfig) -> Option<VariantChoice> {
    let mut best: Option<VariantChoice> = None;
    let mut evaluated = 0;
    for variant in variants {
        evaluated += 1;
        let answers = filter_to_answer_key(&resolve(&variant.text, key, cfg).answers, key);
        let score = score_variant(&answers, &variant.text, key);
        let ratio = fill_ratio(&answers, key);
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(VariantChoice { name: variant.name.clone(), answers, score, fill_ratio: ratio, evaluated: 0 });
        }
        if !key.is_empty() && ratio >= cfg.early_exit_fill_ratio {
            break;
        }
    }
    best.map(|choice| VariantChoice { evaluated, ..choice })
}

/// Apply non-blank `overrides` on top of `base`. Blank overrides never erase
/// an answer. Returns how many entries changed.
pub fn merge_overrides(base: &mut ParseResult, overrides: &ParseResult) -> usize {
    let mut changed = 0;
    for (question, answer) in overrides.iter() {
        if is_blank(answer) || base.get(question) == Some(answer) {
            continue;
        }
        base.insert(question, answer);
        changed += 1;
    }
    changed
}

#[derive(Debug, Error)]
pub enum EnumerateError {
    #[error("NoFilesFound")]
    NoFilesFound { guidance: String },
}

/// Enumerate transcripts using a glob pattern (e.g., "./transcripts/**/*.txt").
/// Returns a sorted list of paths.
pub fn enumerate_transcripts(glob_pattern: &str) -> Result<Vec<PathBuf>, EnumerateError> {
    let root = if Path::new(glob_pattern).is_absolute() { "/" } else { "." };
    let pat = glob_pattern.trim_start_matches("./");
    let mut paths: Vec<PathBuf> = GlobWalkerBuilder::from_patterns(root, &[pat])
        .case_insensitive(false)
        .follow_links(false)
        .build()
        .map_err(|_| EnumerateError::NoFilesFound { guidance: folder_guidance() })?
        .filter_map(|e| e.ok())
        .map(|e| e.path().to_path_buf())
        .collect();

    paths.sort();
    paths.retain(|p| p.is_file());

    if paths.is_empty() {
        return Err(EnumerateError::NoFilesFound { guidance: folder_guidance() });
    }

    Ok(paths)
}

fn folder_guidance() -> String {
    let guide = r#"No transcripts matched ./transcripts/**/*.txt
Suggested layout:
  ./transcripts/<class>/<student>.txt
One OCR transcript per answer sheet, plain UTF-8 text."#;
    guide.to_string()
}

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("WriteFailed: {0}")]
    WriteFailed(String),
}

/// Atomically write `<doc_id>.answers.json` into `outdir`.
pub fn emit_result(resolution: &Resolution, transcript: &str, outdir: &Path, doc_id: &str) -> Result<PathBuf, EmitError> {
    std::fs::create_dir_all(outdir).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    let path = outdir.join(format!("{}.answers.json", doc_id));
    let doc = result_document(resolution, transcript, doc_id);
    let bytes = serde_json::to_vec_pretty(&doc).map_err(|e| EmitError::WriteFailed(e.to_string()))?;

    // Write into a temp file next to the target, then rename over it
    let mut tmp = tempfile::NamedTempFile::new_in(outdir).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    tmp.write_all(&bytes).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    tmp.persist(&path).map_err(|e| EmitError::WriteFailed(e.error.to_string()))?;

    Ok(path)
}

/// JSON document for one parsed transcript.
pub fn result_document(resolution: &Resolution, transcript: &str, doc_id: &str) -> serde_json::Value {
    serde_json::json!({
        "doc_id": doc_id,
        "answers": resolution.answers,
        "report": resolution.report,
        "transcript_sha256": sha256_hex(transcript.as_bytes()),
    })
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    format!("{:x}", Sha256::digest(bytes))
}
