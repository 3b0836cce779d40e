//! Shell completion scripts for the graft binary.

use std::io;

use anyhow::{Context, Result, bail};
use clap::CommandFactory;
use clap_complete::Shell as CompletionShell;

use crate::cli::{Cli, CompletionsArgs, Shell};

impl Shell {
    fn to_clap(&self) -> CompletionShell {
        match self {
            Shell::Bash => CompletionShell::Bash,
            Shell::Zsh => CompletionShell::Zsh,
            Shell::Fish => CompletionShell::Fish,
            Shell::PowerShell => CompletionShell::PowerShell,
            Shell::Elvish => CompletionShell::Elvish,
        }
    }
}

/// Emit a completion script to stdout or into `--out-dir`.
pub fn run(args: CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    let shell = args.shell.to_clap();

    if args.stdout {
        clap_complete::generate(shell, &mut cmd, "graft", &mut io::stdout());
        return Ok(());
    }

    let Some(dir) = args.out_dir else {
        bail!("pass --out-dir DIR or --stdout");
    };
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let written = clap_complete::generate_to(shell, &mut cmd, "graft", &dir)
        .with_context(|| format!("writing completion script into {}", dir.display()))?;
    eprintln!("Wrote {}", written.display());
    Ok(())
}
