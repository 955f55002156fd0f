//! CLI: correction documents → (C headers | input summary)
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use flate2::read::GzDecoder;
use fs_err as fs;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

use crate::pipeline::{self, BatchReport, GenerateSettings};
use crate::schema::{self, summary, Correction};
use crate::target::Target;
use crate::writer::{FormatStatus, Formatter, OutputWriter, DEFAULT_FORMATTER, DEFAULT_OUT_DIR};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile correction definitions into dependency-free C headers
#[derive(Parser, Debug)]
#[command(name = "corrcc", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// emit one header per correction
    Generate(GenerateOut),
    /// print the derived input summary of each correction as JSON
    Summary(SummaryOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (one document per line)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /corrections/0)
    #[arg(long)]
    json_pointer: Option<String>,

    /// jq filter applied to each document; every output is treated as a document
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output directory (created if missing)
    #[arg(short, long, default_value = DEFAULT_OUT_DIR)]
    out_dir: PathBuf,

    /// code-generation backend
    #[arg(long, value_enum, default_value_t = Target::C)]
    target: Target,

    /// formatter executable, fed on stdin
    #[arg(long, default_value = DEFAULT_FORMATTER)]
    formatter: String,

    /// seconds before the formatter is killed and raw output is written
    #[arg(long, default_value_t = 10)]
    formatter_timeout: u64,

    /// write unformatted output without trying the formatter
    #[arg(long)]
    no_format: bool,

    /// only generate corrections whose name matches this regex
    #[arg(long)]
    only: Option<String>,

    /// do not emit range guards for int inputs
    #[arg(long)]
    no_int_guards: bool,

    /// stop at the first failing correction
    #[arg(long)]
    fail_fast: bool,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct SummaryOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_documents(&self) -> Result<Vec<Value>> {
        let source_paths = resolve_file_path_patterns(&self.input)?;
        let mut docs = Vec::new();
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = read_source(&source_path)?;
            let raw_docs = if self.ndjson {
                source
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .enumerate()
                    .map(|(i, line)| {
                        serde_json::from_str::<Value>(line).with_context(|| {
                            format!("failed to parse NDJSON record {} of {source_path_str}", i + 1)
                        })
                    })
                    .collect::<Result<Vec<_>>>()?
            } else {
                vec![serde_json::from_str::<Value>(&source)
                    .with_context(|| format!("failed to parse JSON source file ({source_path_str})"))?]
            };
            debug!(path = %source_path_str, documents = raw_docs.len(), "loaded");

            for doc in raw_docs {
                let doc = match self.json_pointer.as_deref() {
                    None => doc,
                    Some(ptr) => doc.pointer(ptr).cloned().with_context(|| {
                        format!("JSON pointer {ptr} matched nothing in {source_path_str}")
                    })?,
                };
                match self.jq_expr.as_ref() {
                    None => docs.push(doc),
                    Some(jq_expr) => {
                        let outputs = crate::jq_exec::run_jaq(jq_expr, &doc).with_context(|| {
                            format!("failed to apply jq expression to source file ({source_path_str})")
                        })?;
                        docs.extend(outputs);
                    }
                }
            }
        }
        Ok(docs)
    }

    fn load_corrections(&self) -> Result<Vec<Correction>> {
        let mut corrections = Vec::new();
        for doc in self.load_documents()? {
            corrections.extend(schema::corrections_from_value(doc)?);
        }
        info!(count = corrections.len(), "corrections loaded");
        Ok(corrections)
    }
}

impl GenerateOut {
    fn settings(&self) -> Result<GenerateSettings> {
        let only = self
            .only
            .as_deref()
            .map(Regex::new)
            .transpose()
            .context("invalid --only pattern")?;
        Ok(GenerateSettings {
            target: self.target,
            int_guards: !self.no_int_guards,
            only,
            fail_fast: self.fail_fast,
        })
    }

    fn writer(&self) -> OutputWriter {
        let formatter = (!self.no_format).then(|| {
            Formatter::new(&self.formatter).timeout(Duration::from_secs(self.formatter_timeout))
        });
        OutputWriter::new(&self.out_dir).with_formatter(formatter)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Generate(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                let corrections = target.input_settings.load_corrections()?;
                let settings = target.settings()?;
                let writer = target.writer();

                let report = pipeline::generate(&corrections, &settings, &writer);
                print_report(&report);
                if let Some((name, error)) = pipeline::first_error(&report) {
                    bail!(
                        "{} of {} corrections failed (first: {name}: {error})",
                        report.failed(),
                        report.entries.len()
                    );
                }
                Ok(())
            }
            Command::Summary(target) => {
                let corrections = target.input_settings.load_corrections()?;
                let summaries = corrections.iter().map(summary::summarize).collect::<Vec<_>>();
                let summary_src = serde_json::to_string_pretty(&summaries)?;
                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(out, &summary_src)?;
                } else {
                    println!("{summary_src}");
                }
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn print_report(report: &BatchReport) {
    for entry in &report.entries {
        match &entry.result {
            Ok(outcome) => {
                let marker = match outcome.status {
                    FormatStatus::Raw(_) => "⚠️ ".yellow(),
                    FormatStatus::Formatted | FormatStatus::Disabled => "✅".green(),
                };
                println!("{marker} {} → {}", entry.name, outcome.path.display());
            }
            Err(error) => println!("{} {}: {error}", "❌".red(), entry.name),
        }
        for advisory in &entry.advisories {
            println!("   {} {advisory}", "note:".yellow());
        }
    }
    println!(
        "{} written, {} failed, {} skipped",
        report.succeeded().to_string().green(),
        report.failed().to_string().red(),
        report.skipped,
    );
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Read a source file as text, inflating it first if it is gzip-compressed
/// (detected from the magic bytes, so the extension does not matter).
fn read_source(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut source = String::new();
        GzDecoder::new(bytes.as_slice())
            .read_to_string(&mut source)
            .with_context(|| format!("failed to decompress {}", path.display()))?;
        return Ok(source);
    }
    String::from_utf8(bytes).with_context(|| format!("{} is not UTF-8 text", path.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
