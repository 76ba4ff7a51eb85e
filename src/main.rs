use std::collections::HashSet;
use std::path::{Path, PathBuf};

use answer_sheet_parser::{
    emit_result, enumerate_transcripts, filled_count, load_answer_key, load_config, parse_unkeyed,
    resolve, result_document, select_best_variant, AnswerKey, EnumerateError, ParseMode, ParseReport,
    ParserConfig, Resolution, Variant,
};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sheetparse", about = "Extract student answers from OCR transcripts of answer sheets")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to parser config file (YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Parse one transcript and print or write its answers.
    Parse {
        /// OCR transcript (plain text).
        transcript: PathBuf,
        /// Answer key (YAML/JSON mapping). Without it the unkeyed parse is used.
        #[arg(long)]
        key: Option<PathBuf>,
        /// Only accept answers found in the key.
        #[arg(long, requires = "key")]
        strict: bool,
        /// Write `<doc_id>.answers.json` here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Parse every transcript matched by a glob pattern.
    Batch {
        /// Glob pattern; defaults to the config's input_glob.
        pattern: Option<String>,
        #[arg(long)]
        key: PathBuf,
        #[arg(long)]
        strict: bool,
        /// Output directory; defaults to the config's output_dir.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Pick the best of several transcripts of the same sheet.
    Variants {
        #[arg(required = true)]
        transcripts: Vec<PathBuf>,
        #[arg(long)]
        key: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "tool": "load_config",
                        "file": path,
                        "error": e.to_string(),
                        "error_code": 3
                    })
                );
                std::process::exit(3);
            }
        },
        None => ParserConfig::default(),
    };

    match cli.command {
        Command::Parse { transcript, key, strict, out } => {
            if strict {
                cfg.mode = ParseMode::Strict;
            }
            let text = read_transcript(&transcript);
            let resolution = match &key {
                Some(key_path) => resolve(&text, &read_key(key_path), &cfg),
                None => unkeyed_resolution(&text, &cfg),
            };
            log_resolution(&transcript, &resolution);
            let doc_id = slugify(&file_stem(&transcript));
            match out {
                Some(outdir) => write_result(&transcript, &resolution, &text, &outdir, &doc_id),
                None => println!("{}", result_document(&resolution, &text, &doc_id)),
            }
        }
        Command::Batch { pattern, key, strict, out } => {
            if strict {
                cfg.mode = ParseMode::Strict;
            }
            let answer_key = read_key(&key);
            let pattern = pattern.unwrap_or_else(|| cfg.input_glob());
            let outdir = out.unwrap_or_else(|| PathBuf::from(cfg.output_dir()));
            let files = match enumerate_transcripts(&pattern) {
                Ok(files) => files,
                Err(EnumerateError::NoFilesFound { guidance }) => {
                    eprintln!(
                        "{}",
                        serde_json::json!({
                            "tool": "enumerate_transcripts",
                            "pattern": pattern,
                            "error": "NoFilesFound",
                            "error_code": 1
                        })
                    );
                    eprintln!("{}", guidance);
                    std::process::exit(1);
                }
            };
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool": "enumerate_transcripts",
                    "pattern": pattern,
                    "count": files.len()
                })
            );

            // Track used slugs so two sheets never share an output file
            let mut used_doc_ids: HashSet<String> = HashSet::new();
            for file in files {
                let text = read_transcript(&file);
                let resolution = resolve(&text, &answer_key, &cfg);
                log_resolution(&file, &resolution);
                let doc_id = unique_slug(slugify(&file_stem(&file)), &mut used_doc_ids);
                write_result(&file, &resolution, &text, &outdir, &doc_id);
            }
        }
        Command::Variants { transcripts, key } => {
            let answer_key = read_key(&key);
            let variants: Vec<Variant> = transcripts
                .iter()
                .map(|path| Variant { name: path.display().to_string(), text: read_transcript(path) })
                .collect();
            match select_best_variant(&variants, &answer_key, &cfg) {
                Some(choice) => {
                    eprintln!(
                        "{}",
                        serde_json::json!({
                            "tool": "select_best_variant",
                            "variants": variants.len(),
                            "evaluated": choice.evaluated,
                            "winner": choice.name,
                            "score": choice.score,
                            "fill_ratio": choice.fill_ratio
                        })
                    );
                    println!("{}", serde_json::json!(choice));
                }
                None => {
                    eprintln!(
                        "{}",
                        serde_json::json!({
                            "tool": "select_best_variant",
                            "error": "NoVariants",
                            "error_code": 1
                        })
                    );
                    std::process::exit(1);
                }
            }
        }
    }
}

fn unkeyed_resolution(text: &str, cfg: &ParserConfig) -> Resolution {
    let answers = parse_unkeyed(text);
    Resolution {
        report: ParseReport {
            mode: cfg.mode,
            key_size: 0,
            fills: Vec::new(),
            winner: None,
            order_only_tried: false,
        },
        answers,
    }
}

fn read_transcript(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool": "read_transcript",
                    "file": path,
                    "error": e.to_string(),
                    "error_code": 1
                })
            );
            std::process::exit(1);
        }
    }
}

fn read_key(path: &Path) -> AnswerKey {
    match load_answer_key(path) {
        Ok(key) => {
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool": "load_answer_key",
                    "file": path,
                    "status": "ok",
                    "questions": key.len()
                })
            );
            key
        }
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool": "load_answer_key",
                    "file": path,
                    "error": e.to_string(),
                    "error_code": 2
                })
            );
            std::process::exit(2);
        }
    }
}

fn log_resolution(file: &Path, resolution: &Resolution) {
    eprintln!(
        "{}",
        serde_json::json!({
            "tool": "resolve",
            "file": file,
            "answers": resolution.answers.len(),
            "filled": filled_count(&resolution.answers),
            "report": resolution.report
        })
    );
}

fn write_result(file: &Path, resolution: &Resolution, text: &str, outdir: &Path, doc_id: &str) {
    match emit_result(resolution, text, outdir, doc_id) {
        Ok(path) => {
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool": "emit_result",
                    "file": file,
                    "json_path": path
                })
            );
        }
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool": "emit_result",
                    "file": file,
                    "error": e.to_string(),
                    "error_code": 6
                })
            );
            std::process::exit(6);
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("sheet")
        .to_string()
}

fn slugify(base: &str) -> String {
    let lower = base.to_lowercase();
    let mut collapsed = String::with_capacity(lower.len());
    let mut prev_dash = false;
    for ch in lower.chars() {
        if ch.is_ascii_alphanumeric() {
            collapsed.push(ch);
            prev_dash = false;
        } else if !prev_dash {
            collapsed.push('-');
            prev_dash = true;
        }
    }
    let trimmed = collapsed.trim_matches('-');
    if trimmed.is_empty() {
        "sheet".to_string()
    } else {
        trimmed.to_string()
    }
}

fn unique_slug(slug_in: String, used: &mut HashSet<String>) -> String {
    if used.insert(slug_in.clone()) {
        return slug_in;
    }
    let mut i = 1;
    loop {
        let candidate = format!("{}-{}", slug_in, i);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        i += 1;
    }
}
