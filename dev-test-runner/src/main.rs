//! Runs the JSON fixtures under `fixtures/` against `json_oasis`.
//!
//! Each fixture is a list of cases. A case carries an inline declaration
//! document, the model to validate against, an input, and what to expect:
//! the grouped error view, the serialized output, or a declaration error.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use colored::Colorize;
use serde::Deserialize;
use serde_json::Value;

use json_oasis::{Origin, decl};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Case {
    name: String,
    decl: Value,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    origin: Option<String>,
    #[serde(default)]
    input: Value,
    expect: Expect,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Expect {
    /// `format_errors` view of the failure.
    Errors(Value),
    /// Serialized form of the validated record.
    Output(Value),
    /// Substring of the declaration loader's error.
    DeclError(String),
}

fn main() -> ExitCode {
    let pattern = std::env::args().nth(1).unwrap_or_else(|| default_pattern().to_string_lossy().to_string());
    match run(&pattern) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red().bold());
            ExitCode::from(2)
        }
    }
}

fn default_pattern() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join("*.json")
}

fn run(pattern: &str) -> Result<bool> {
    let mut passed = 0usize;
    let mut failed = 0usize;
    for entry in glob::glob(pattern)? {
        let path = entry?;
        let src = std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let de = &mut serde_json::Deserializer::from_str(&src);
        let cases: Vec<Case> = serde_path_to_error::deserialize(de)
            .map_err(|e| anyhow!("at JSON path {} → {}", e.path(), e.inner()))
            .with_context(|| format!("malformed fixture {}", path.display()))?;
        let file = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        for case in &cases {
            match run_case(case) {
                Ok(()) => {
                    passed += 1;
                    println!("{} {file} :: {}", "✓".green(), case.name);
                }
                Err(error) => {
                    failed += 1;
                    println!("{} {file} :: {}", "✗".red().bold(), case.name);
                    println!("    {}", format!("{error:#}").yellow());
                }
            }
        }
    }
    if passed + failed == 0 {
        bail!("no fixtures matched {pattern}");
    }
    let summary = format!("{passed} passed, {failed} failed");
    println!("{}", if failed == 0 { summary.green() } else { summary.red() });
    Ok(failed == 0)
}

fn run_case(case: &Case) -> Result<()> {
    let loaded = decl::from_str(&case.decl.to_string());
    if let Expect::DeclError(needle) = &case.expect {
        return match loaded {
            Ok(_) => bail!("declarations loaded; expected an error containing `{needle}`"),
            Err(e) if e.to_string().contains(needle.as_str()) => Ok(()),
            Err(e) => bail!("expected an error containing `{needle}`, got `{e}`"),
        };
    }
    let decls = loaded?;
    let name = case.model.as_deref().context("case has no `model`")?;
    let model = decls.model(name)?;
    let origin = match case.origin.as_deref() {
        None | Some("body") => Origin::Body,
        Some("text") => Origin::Text,
        Some(other) => bail!("unknown origin `{other}`"),
    };

    let result = model.deserialize(&case.input, origin);
    match (&case.expect, result) {
        (Expect::Errors(want), Err(e)) => same(want, &e.format_errors()),
        (Expect::Errors(_), Ok(rec)) => bail!("expected errors, validation passed: {rec:?}"),
        (Expect::Output(want), Ok(rec)) => same(want, &model.serialize(&rec.into())?),
        (Expect::Output(_), Err(e)) => bail!("expected success, got:\n{e}"),
        (Expect::DeclError(_), _) => Ok(()),
    }
}

fn same(want: &Value, got: &Value) -> Result<()> {
    if want == got {
        return Ok(());
    }
    bail!(
        "mismatch\n  want: {}\n  got:  {}",
        serde_json::to_string(want)?,
        serde_json::to_string(got)?
    )
}
