//! CLI: validate documents against a declared model, or emit the OpenAPI document.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info};

use json_oasis::{Declarations, Origin, ValidationError, decl};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// validate JSON documents against declared models, or synthesize the OpenAPI document
#[derive(Parser, Debug)]
#[command(name = "json-oasis", version)]
pub struct CommandLineInterface {
    /// more logging (-v debug, -vv trace); RUST_LOG wins when set
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// validate every input document against one model
    Validate(ValidateCmd),
    /// write the OpenAPI 3.0.3 document for the declared operations
    Spec(SpecCmd),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OriginArg {
    /// typed JSON, as in request bodies
    Body,
    /// text values, as in query strings and forms
    Text,
}

#[derive(clap::Parser, Debug)]
struct ValidateCmd {
    /// declaration document (.json)
    #[arg(long)]
    decl: PathBuf,

    /// model to validate against
    #[arg(long)]
    model: String,

    #[arg(long, value_enum, default_value_t = OriginArg::Body)]
    origin: OriginArg,

    /// print the serialized form of every valid document
    #[arg(long)]
    echo: bool,

    #[command(flatten)]
    input_settings: InputSettings,
}

#[derive(clap::Parser, Debug)]
struct SpecCmd {
    /// declaration document (.json)
    #[arg(long)]
    decl: PathBuf,

    /// override `info.title`
    #[arg(long)]
    title: Option<String>,

    /// override `info.version`
    #[arg(long)]
    api_version: Option<String>,

    /// override `info.description`
    #[arg(long)]
    description: Option<String>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    #[arg(long)]
    pretty: bool,
}

/// One validated document.
struct Outcome {
    label: String,
    result: Result<Value, String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    /// Every input document, labelled `path` or `path:line`.
    fn load(&self) -> Result<Vec<(String, Value)>> {
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        let mut out = Vec::new();
        for source_path in source_paths {
            let label = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {label}"))?;
            if self.ndjson {
                for (i, line) in source.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
                    let value = serde_json::from_str(line)
                        .with_context(|| format!("failed to parse JSON at {label}:{}", i + 1))?;
                    out.push((format!("{label}:{}", i + 1), value));
                }
            } else {
                let value = serde_json::from_str(&source).with_context(|| format!("failed to parse JSON source file {label}"))?;
                out.push((label, value));
            }
        }
        Ok(out)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<ExitCode> {
        match &self.cmd {
            Command::Validate(target) => target.run(),
            Command::Spec(target) => target.run(),
        }
    }
}

impl ValidateCmd {
    fn run(&self) -> Result<ExitCode> {
        let decls = load_decls(&self.decl)?;
        let model = decls.model(&self.model)?;
        let origin = match self.origin {
            OriginArg::Body => Origin::Body,
            OriginArg::Text => Origin::Text,
        };
        let docs = self.input_settings.load()?;
        debug!(model = model.name(), documents = docs.len(), "validating");

        let outcomes: Vec<Outcome> = docs
            .par_iter()
            .map(|(label, value)| Outcome {
                label: label.clone(),
                result: model
                    .deserialize(value, origin)
                    .map_err(|e| render_errors(&e))
                    .and_then(|rec| model.serialize(&rec.into()).map_err(|e| e.to_string())),
            })
            .collect();

        let mut failed = 0usize;
        for o in &outcomes {
            match &o.result {
                Ok(value) => {
                    println!("{} {}", "✓".green().bold(), o.label);
                    if self.echo {
                        println!("{}", serde_json::to_string_pretty(value)?);
                    }
                }
                Err(report) => {
                    failed += 1;
                    println!("{} {}", "✗".red().bold(), o.label);
                    println!("{report}");
                }
            }
        }
        let summary = format!("{} of {} documents valid", outcomes.len() - failed, outcomes.len());
        if failed == 0 {
            eprintln!("{}", summary.green());
            Ok(ExitCode::SUCCESS)
        } else {
            eprintln!("{}", summary.red());
            Ok(ExitCode::FAILURE)
        }
    }
}

impl SpecCmd {
    fn run(&self) -> Result<ExitCode> {
        let overrides = [("title", &self.title), ("version", &self.api_version), ("description", &self.description)];
        if overrides.iter().any(|(_, v)| v.is_some()) {
            let mut raw: Value = serde_json::from_str(&read(&self.decl)?)
                .with_context(|| format!("failed to parse {}", self.decl.display()))?;
            for (key, value) in overrides {
                if let Some(value) = value {
                    raw["info"][key] = Value::from(value.as_str());
                }
            }
            let decls = decl::from_str(&raw.to_string()).context("invalid declaration document")?;
            return self.write(&decls);
        }
        self.write(&load_decls(&self.decl)?)
    }

    fn write(&self, decls: &Declarations) -> Result<ExitCode> {
        let src = decls.api.to_json(self.pretty)?;
        if let Some(out) = self.out.as_ref() {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, &src).with_context(|| format!("failed to write {}", out.display()))?;
            info!(path = %out.display(), "document written");
        } else {
            println!("{src}");
        }
        Ok(ExitCode::SUCCESS)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_decls(path: &Path) -> Result<Declarations> {
    decl::load(path).with_context(|| format!("invalid declaration document {}", path.display()))
}

fn render_errors(e: &ValidationError) -> String {
    e.to_string()
        .lines()
        .map(|l| format!("    {}", l.yellow()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }
    Ok(out)
}
