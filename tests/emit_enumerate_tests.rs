use std::fs;
use std::path::PathBuf;

use answer_sheet_parser::{
    emit_result, enumerate_transcripts, resolve, result_document, sha256_hex, AnswerKey, ParseResult,
    ParserConfig,
};

fn key(pairs: &[(u32, &str)]) -> AnswerKey {
    pairs.iter().map(|(q, a)| (*q, a.to_string())).collect()
}

#[test]
fn enumerate_transcripts_finds_nested_files() {
    let td = tempfile::tempdir().unwrap();
    let base = td.path();
    let class_dir = base.join("transcripts/grade-7");
    fs::create_dir_all(&class_dir).unwrap();
    fs::write(class_dir.join("juan.txt"), "1. A\n").unwrap();
    fs::write(class_dir.join("notes.md"), "ignore me").unwrap();

    let pattern = format!("{}/transcripts/**/*.txt", base.display());
    let files = enumerate_transcripts(&pattern).expect("should find files");
    let files: Vec<PathBuf> = files.into_iter().map(|p| p.strip_prefix(base).unwrap().to_path_buf()).collect();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].to_string_lossy(), "transcripts/grade-7/juan.txt");
}

#[test]
fn enumerate_transcripts_empty_returns_error_with_guidance() {
    let td = tempfile::tempdir().unwrap();
    let pattern = format!("{}/transcripts/**/*.txt", td.path().display());
    let err = enumerate_transcripts(&pattern).err().expect("should be error");
    assert_eq!(format!("{}", err), "NoFilesFound");
}

#[test]
fn emit_result_writes_answers_json() {
    let k = key(&[(1, "A"), (2, "B")]);
    let text = "1. A\n2. B";
    let resolution = resolve(text, &k, &ParserConfig::default());

    let td = tempfile::tempdir().unwrap();
    let outdir = td.path().join("out");
    let path = emit_result(&resolution, text, &outdir, "juan").expect("emit ok");
    assert_eq!(path, outdir.join("juan.answers.json"));

    let raw = fs::read_to_string(&path).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc["doc_id"], "juan");
    assert_eq!(doc["answers"]["1"], "A");
    assert_eq!(doc["answers"]["2"], "B");
    assert_eq!(doc["report"]["winner"], "number_anchored");
    assert_eq!(doc["report"]["mode"], "fallback");
    assert_eq!(doc["transcript_sha256"], sha256_hex(text.as_bytes()));

    // rewriting the same doc_id replaces the file
    emit_result(&resolution, text, &outdir, "juan").expect("second emit ok");
    assert_eq!(fs::read_to_string(&path).unwrap(), raw);
}

#[test]
fn answers_serialize_in_insertion_order() {
    let answers = ParseResult::from_pairs([(2, "B"), (1, "A")]);
    assert_eq!(serde_json::to_string(&answers).unwrap(), r#"{"2":"B","1":"A"}"#);
    assert_eq!(serde_json::to_value(&answers).unwrap().to_string(), r#"{"2":"B","1":"A"}"#);
}

#[test]
fn result_document_fields_are_ordered() {
    let k = key(&[(1, "A")]);
    let resolution = resolve("1. A", &k, &ParserConfig::default());
    let doc = result_document(&resolution, "1. A", "juan").to_string();
    let at = |field: &str| doc.find(field).unwrap();
    assert!(at("\"doc_id\"") < at("\"answers\""));
    assert!(at("\"answers\"") < at("\"report\""));
    assert!(at("\"report\"") < at("\"transcript_sha256\""));
}

#[test]
fn sha256_hex_known_vector() {
    assert_eq!(
        sha256_hex(b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}
