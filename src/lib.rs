//! **graft** - Apply file-replacement markup from LLM output to a project tree
//!
//! Parses `<file name="...">` / `<replace>` markup into an ordered change
//! document, then applies it with lexical path validation and atomic
//! same-directory writes. Per-file best effort: one bad entry never
//! aborts the batch, and the result itemizes every outcome.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core engines - parsing and filesystem application
pub mod core {
    /// Markup parsing into an ordered, validated change document
    pub mod markup;
    pub use markup::{ChangeOperation, ParseError, ParsedDocument, parse};

    /// Document application with per-file failure containment
    pub mod apply;
    pub use apply::{ApplyResult, ErrorKind, Failure, apply};

    /// Read-only change preview with unified diffs
    pub mod preview;
    pub use preview::{EntryStatus, Preview, PreviewEntry};
}

/// CLI command handlers and exit-code policy
pub mod cli_ext {
    pub mod apply_cmd;
    pub use apply_cmd::{CliError, exit_code_for, finish_with_exit};
}

/// Infrastructure - path validation and durable file I/O
pub mod infra {
    /// Lexical relative-path validation against a project root
    pub mod paths;
    pub use paths::{normalize_rel, resolve_under};

    /// Atomic same-directory writes with directory fsync
    pub mod io;
    pub use io::write_atomic;
}

// Strategic re-exports for library consumers
pub use cli::{AppContext, Cli, Commands};
pub use core::{ApplyResult, ChangeOperation, ErrorKind, Failure, ParseError, ParsedDocument};
pub use core::{apply, parse};
