use clap::Parser;
use graft::cli::{AppContext, Cli, Commands};
use graft::cli_ext::apply_cmd::{apply_run, check_run, finish_with_exit, preview_run};
use tracing_subscriber::EnvFilter;

fn main() {
    // Diagnostics go to stderr so stdout stays parseable under --json
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color || std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()),
    };

    let result = match cli.command {
        Commands::Apply(args) => apply_run(args, &ctx),
        Commands::Preview(args) => preview_run(args, &ctx),
        Commands::Check(args) => check_run(args, &ctx),
        Commands::Completions(args) => graft::completion::run(args),
    };

    finish_with_exit(result)
}
