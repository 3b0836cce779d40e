use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Global flags, resolved once in main and passed to every handler.
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,
    pub no_color: bool,
}

#[derive(Parser)]
#[command(name = "graft")]
#[command(about = "Apply file-replacement markup from LLM output to a project tree")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Turn off colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply markup to the project tree (previews unless --apply)
    Apply(ApplyArgs),

    /// Show what markup would change, without writing
    Preview(PreviewArgs),

    /// Validate markup syntax without touching the tree
    Check(CheckArgs),

    /// Emit shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Markup file to apply; reads stdin when omitted
    pub markup_file: Option<PathBuf>,

    /// Read markup from the system clipboard
    #[arg(long, conflicts_with = "markup_file")]
    pub from_clipboard: bool,

    /// Project root the file paths resolve against
    #[arg(long, default_value = ".")]
    pub root: String,

    /// Write changes to disk (default is preview only)
    #[arg(long)]
    pub apply: bool,

    /// Show unified diffs in the preview
    #[arg(long)]
    pub diff: bool,

    /// Emit a single-line JSON report instead of the human one
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct PreviewArgs {
    /// Markup file to preview; reads stdin when omitted
    pub markup_file: Option<PathBuf>,

    /// Read markup from the system clipboard
    #[arg(long, conflicts_with = "markup_file")]
    pub from_clipboard: bool,

    /// Project root the file paths resolve against
    #[arg(long, default_value = ".")]
    pub root: String,

    /// Show unified diffs per file
    #[arg(long)]
    pub diff: bool,

    /// Emit a single-line JSON report instead of the human one
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct CheckArgs {
    /// Markup file to validate; reads stdin when omitted
    pub markup_file: Option<PathBuf>,

    /// Read markup from the system clipboard
    #[arg(long, conflicts_with = "markup_file")]
    pub from_clipboard: bool,

    /// Emit a single-line JSON report instead of the human one
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Shell flavor to emit
    #[arg(value_enum)]
    pub shell: Shell,

    /// Directory to write the completion file into
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Write the script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
