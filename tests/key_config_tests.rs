use std::fs;

use answer_sheet_parser::{
    load_answer_key, load_config, parse_answer_key, validate_config, AnswerKeyError, ConfigError, ParseMode,
    ParserConfig,
};

#[test]
fn key_accepts_yaml_scalars() {
    let key = parse_answer_key("1: A\n2: \"True\"\n3: True\n4: 42\n5: no way\n").expect("valid key");
    assert_eq!(key.len(), 5);
    assert_eq!(key[&1], "A");
    assert_eq!(key[&2], "True");
    assert_eq!(key[&3], "True");
    assert_eq!(key[&4], "42");
    assert_eq!(key[&5], "no way");
}

#[test]
fn key_accepts_json_objects() {
    let key = parse_answer_key(r#"{"2": "B", "1": " A "}"#).expect("valid key");
    assert_eq!(key.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(key[&1], "A");
}

#[test]
fn empty_key_file_is_an_empty_key() {
    assert!(parse_answer_key("").unwrap().is_empty());
    assert!(parse_answer_key("  \n").unwrap().is_empty());
}

#[test]
fn key_rejects_bad_entries() {
    let long = format!("1: {}", "x".repeat(41));
    for raw in ["201: A", "0: A", "-1: A", "1: \"\"", "1:", "abc: A", "1: [A, B]", long.as_str()] {
        match parse_answer_key(raw) {
            Err(AnswerKeyError::Invalid(_)) => {}
            other => panic!("{:?} should be invalid, got {:?}", raw, other),
        }
    }
}

#[test]
fn key_rejects_duplicate_questions() {
    let err = parse_answer_key("1: A\n\"1\": B").unwrap_err();
    assert!(matches!(err, AnswerKeyError::Invalid(_)));
    assert!(err.to_string().contains("duplicate question 1"));
}

#[test]
fn key_must_be_a_mapping() {
    assert!(matches!(parse_answer_key("- A\n- B"), Err(AnswerKeyError::Parse(_))));
}

#[test]
fn key_loads_from_file() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("key.yaml");
    fs::write(&path, "1: A\n2: B\n").unwrap();
    let key = load_answer_key(&path).unwrap();
    assert_eq!(key.len(), 2);

    let missing = td.path().join("missing.yaml");
    assert!(matches!(load_answer_key(&missing), Err(AnswerKeyError::Read(_))));
}

#[test]
fn config_defaults_fill_missing_fields() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("sheetparse.yaml");
    fs::write(&path, "fallback_threshold: 0.5\nmode: strict\n").unwrap();
    let cfg = load_config(&path).unwrap();
    assert_eq!(cfg.fallback_threshold, 0.5);
    assert_eq!(cfg.mode, ParseMode::Strict);
    assert_eq!(cfg.early_exit_fill_ratio, ParserConfig::default().early_exit_fill_ratio);
    assert_eq!(cfg.input_glob(), "./transcripts/**/*.txt");
    assert_eq!(cfg.output_dir(), "./output");
}

#[test]
fn config_paths_override_defaults() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("sheetparse.yaml");
    fs::write(&path, "input_glob: ./scans/*.txt\noutput_dir: ./graded\n").unwrap();
    let cfg = load_config(&path).unwrap();
    assert_eq!(cfg.input_glob(), "./scans/*.txt");
    assert_eq!(cfg.output_dir(), "./graded");
    assert_eq!(cfg.mode, ParseMode::Fallback);
}

#[test]
fn empty_config_file_is_default() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("sheetparse.yaml");
    fs::write(&path, "").unwrap();
    assert_eq!(load_config(&path).unwrap(), ParserConfig::default());
}

#[test]
fn config_errors_by_kind() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("sheetparse.yaml");

    assert!(matches!(load_config(&path), Err(ConfigError::Read(_))));

    fs::write(&path, "mode: sloppy\n").unwrap();
    assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));

    fs::write(&path, "fallback_threshold: 1.5\n").unwrap();
    assert!(matches!(load_config(&path), Err(ConfigError::Invalid(_))));
}

#[test]
fn ratios_must_be_within_unit_interval() {
    let cfg = ParserConfig { early_exit_fill_ratio: -0.1, ..ParserConfig::default() };
    let err = validate_config(&cfg).unwrap_err();
    assert!(err.to_string().contains("early_exit_fill_ratio"));
    assert!(validate_config(&ParserConfig::default()).is_ok());
}
