//! CLI command handlers for the apply/preview/check flow.
//!
//! Handlers wire input acquisition (file, clipboard, stdin), parsing,
//! and the core engines together, then render a human or JSON report.
//! Exit codes are centralized here so CI behavior stays predictable.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Style};
use serde_json::json;

use crate::cli::{AppContext, ApplyArgs, CheckArgs, PreviewArgs};
use crate::core::apply::{self, ApplyResult, ErrorKind};
use crate::core::markup;
use crate::core::preview::{self, EntryStatus, Preview};

/// Version stamp for the JSON report shape shared by apply/preview/check.
const REPORT_SCHEMA_VERSION: u32 = 1;

/// Error taxonomy the exit codes derive from.
#[derive(thiserror::Error, Debug, Clone)]
pub enum CliError {
    /// Unreadable or unparseable markup input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Project root missing, not a directory, or otherwise unusable
    #[error("root issue: {0}")]
    Root(String),

    /// The batch ran to completion but some operations failed
    #[error("{0} operation(s) failed")]
    Partial(usize),

    /// Unexpected bugs
    #[error("internal error: {0}")]
    Internal(String),
}

/// Converts errors to exit codes
/// 0=success, 2=partial failure, 3=invalid input, 4=root issue, 5=internal
pub fn exit_code_for(e: &CliError) -> i32 {
    match e {
        CliError::Partial(_) => 2,
        CliError::InvalidInput(_) => 3,
        CliError::Root(_) => 4,
        CliError::Internal(_) => 5,
    }
}

/// Report the error chain and terminate with its mapped exit code.
/// Single exit point, so scripts can rely on the codes.
pub fn finish_with_exit(result: Result<()>) -> ! {
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            let code = e.downcast_ref::<CliError>().map_or(5, exit_code_for);
            eprintln!("{e:#}");
            std::process::exit(code);
        }
    }
}

/// Apply markup with the unified preview/apply flow.
pub fn apply_run(args: ApplyArgs, ctx: &AppContext) -> Result<()> {
    // 1) Resolve input (file, clipboard, or stdin)
    let input = read_markup(args.markup_file.as_deref(), args.from_clipboard)?;

    // 2) Parse into an ordered document
    let document = markup::parse(&input)
        .map_err(|e| CliError::InvalidInput(format!("parse error: {e}")))?;

    // 3) Resolve the project root
    let root = resolve_root(&args.root)?;

    // 4) Decide run mode: safe default is preview unless --apply was passed
    if !args.apply {
        if !ctx.quiet {
            eprintln!("Safety mode: preview only. Pass --apply to write changes.");
        }
        let report = preview::build(&root, &document, args.diff)
            .map_err(|e| CliError::Root(format!("{e:#}")))?;
        render_preview(&report, args.json, ctx)?;
        return Ok(());
    }

    // 5) Apply for real
    let result = apply::apply(&root, &document).map_err(|e| CliError::Root(format!("{e:#}")))?;

    // 6) Report results, then surface partial failure through the exit code
    render_apply(&result, args.json, ctx)?;
    if !result.is_clean() {
        return Err(CliError::Partial(result.failed.len()).into());
    }
    Ok(())
}

/// Preview markup changes without applying them.
pub fn preview_run(args: PreviewArgs, ctx: &AppContext) -> Result<()> {
    let input = read_markup(args.markup_file.as_deref(), args.from_clipboard)?;
    let document = markup::parse(&input)
        .map_err(|e| CliError::InvalidInput(format!("parse error: {e}")))?;
    let root = resolve_root(&args.root)?;

    let report = preview::build(&root, &document, args.diff)
        .map_err(|e| CliError::Root(format!("{e:#}")))?;
    render_preview(&report, args.json, ctx)
}

/// Validate markup syntax without touching the tree.
pub fn check_run(args: CheckArgs, ctx: &AppContext) -> Result<()> {
    let input = read_markup(args.markup_file.as_deref(), args.from_clipboard)?;

    match markup::parse(&input) {
        Ok(document) => {
            if args.json {
                let files: Vec<&str> = document
                    .operations
                    .iter()
                    .map(|op| op.path().as_str())
                    .collect();
                let payload = json!({
                    "schema_version": REPORT_SCHEMA_VERSION,
                    "valid": true,
                    "operations": document.len(),
                    "files": files,
                });
                println!("{}", to_json_line(&payload)?);
            } else if !ctx.quiet {
                println!("Markup is valid");
                println!("   {} operation(s)", document.len());
                for op in &document.operations {
                    println!("   {} {}", op.kind(), op.path());
                }
            }
            Ok(())
        }
        Err(e) => {
            if args.json {
                let payload = json!({
                    "schema_version": REPORT_SCHEMA_VERSION,
                    "valid": false,
                    "error": e.to_string(),
                });
                println!("{}", to_json_line(&payload)?);
            }
            Err(CliError::InvalidInput(format!("parse error: {e}")).into())
        }
    }
}

/// Resolve markup text from a file, the clipboard, or stdin.
fn read_markup(file: Option<&Path>, from_clipboard: bool) -> Result<String> {
    if let Some(path) = file {
        let text = fs::read_to_string(path).map_err(|e| {
            CliError::InvalidInput(format!("failed to read {}: {e}", path.display()))
        })?;
        return Ok(text);
    }
    if from_clipboard {
        return get_clipboard_content();
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| CliError::InvalidInput(format!("failed to read stdin: {e}")))?;
    Ok(buf)
}

fn get_clipboard_content() -> Result<String> {
    use arboard::Clipboard;
    let mut clipboard = Clipboard::new().context("clipboard unavailable")?;
    clipboard.get_text().context("clipboard has no text content")
}

/// Expand `~`, canonicalize, and verify the project root is a directory.
fn resolve_root(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::tilde(raw);
    let root = dunce::canonicalize(expanded.as_ref())
        .map_err(|e| CliError::Root(format!("unusable root {raw}: {e}")))?;
    if !root.is_dir() {
        return Err(CliError::Root(format!("root is not a directory: {}", root.display())).into());
    }
    Ok(root)
}

fn render_apply(result: &ApplyResult, as_json: bool, ctx: &AppContext) -> Result<()> {
    if as_json {
        // Single line for machine parsing
        let payload = json!({
            "schema_version": REPORT_SCHEMA_VERSION,
            "applied": result.applied,
            "failed": result.failed,
            "summary": {
                "applied": result.applied.len(),
                "failed": result.failed.len(),
            },
        });
        println!("{}", to_json_line(&payload)?);
        return Ok(());
    }

    if ctx.quiet {
        for failure in &result.failed {
            eprintln!(
                "{} {}  ({})",
                failure_label(failure.kind, ctx),
                failure.path,
                failure.detail
            );
        }
        return Ok(());
    }

    for path in &result.applied {
        println!("{} {path}", status_label("applied", Style::new().green(), ctx));
    }
    for failure in &result.failed {
        println!(
            "{} {}  ({})",
            failure_label(failure.kind, ctx),
            failure.path,
            failure.detail
        );
    }
    println!(
        "{} applied, {} failed",
        result.applied.len(),
        result.failed.len()
    );
    Ok(())
}

fn render_preview(report: &Preview, as_json: bool, ctx: &AppContext) -> Result<()> {
    if as_json {
        let payload = json!({
            "schema_version": REPORT_SCHEMA_VERSION,
            "entries": report.entries,
            "summary": {
                "creates": report.creates,
                "overwrites": report.overwrites,
                "unchanged": report.unchanged,
                "rejected": report.rejected,
                "operations": report.operations,
            },
        });
        println!("{}", to_json_line(&payload)?);
        return Ok(());
    }

    if ctx.quiet {
        for entry in &report.entries {
            if let EntryStatus::Rejected(reason) = &entry.status {
                eprintln!(
                    "{} {}  ({reason})",
                    status_label("rejected", Style::new().red(), ctx),
                    entry.path
                );
            }
        }
        return Ok(());
    }

    for entry in &report.entries {
        match &entry.status {
            EntryStatus::Create => {
                println!("{} {}", status_label("create", Style::new().green(), ctx), entry.path);
            }
            EntryStatus::Overwrite => {
                println!(
                    "{} {}",
                    status_label("overwrite", Style::new().yellow(), ctx),
                    entry.path
                );
            }
            EntryStatus::Unchanged => {
                println!("{} {}", status_label("unchanged", Style::new(), ctx), entry.path);
            }
            EntryStatus::Rejected(reason) => {
                println!(
                    "{} {}  ({reason})",
                    status_label("rejected", Style::new().red(), ctx),
                    entry.path
                );
            }
        }
        if let Some(diff) = &entry.diff {
            print!("{diff}");
        }
    }
    println!(
        "{} create, {} overwrite, {} unchanged, {} rejected ({} operations)",
        report.creates, report.overwrites, report.unchanged, report.rejected, report.operations
    );
    Ok(())
}

/// Pad the label before styling so ANSI codes never skew column widths.
fn status_label(text: &str, style: Style, ctx: &AppContext) -> String {
    let padded = format!("{text:<9}");
    if ctx.no_color {
        padded
    } else {
        padded.style(style).to_string()
    }
}

fn failure_label(kind: ErrorKind, ctx: &AppContext) -> String {
    let text = match kind {
        ErrorKind::PathTraversal => "rejected",
        ErrorKind::Io => "failed",
    };
    status_label(text, Style::new().red(), ctx)
}

fn to_json_line(payload: &serde_json::Value) -> Result<String> {
    serde_json::to_string(payload)
        .map_err(|e| CliError::Internal(format!("JSON serialization failed: {e}")).into())
}
