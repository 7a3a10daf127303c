//! # Commands
//!
//! - `hookcheck run` - Run one scenario against a fresh repository
//! - `hookcheck hooks` - List the hooks scenarios can install

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use console::style;
pub use hookcheck_core::CONFIG_FILENAME;

use crate::ui::colors;

const REPO_URL: &str = "https://github.com/hookcheck/hookcheck";

#[derive(Debug, Parser)]
#[command(
    name = "hookcheck",
    version,
    styles = ui::clap_styles(),
    arg_required_else_help = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a scenario file.
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// List available hooks.
    Hooks(HooksArgs),
}

/// Output format for scenario reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable terminal output.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Options that locate configuration and hooks.
#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    /// Path to `.hookcheck.toml` configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory of executable hooks, added to the built-in ones.
    #[arg(long, value_name = "DIR")]
    pub hooks_dir: Option<PathBuf>,
}

/// Arguments for the `hookcheck run` command.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Scenario file to run.
    pub scenario: PathBuf,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,

    #[allow(missing_docs, reason = "flattened clap args are documented on ConfigArgs")]
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Per-command timeout in milliseconds.
    #[arg(short, long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Git executable to use.
    #[arg(long, value_name = "PATH")]
    pub git: Option<PathBuf>,
}

/// Arguments for the `hookcheck hooks` command.
#[derive(Debug, Parser)]
pub struct HooksArgs {
    #[allow(missing_docs, reason = "flattened clap args are documented on ConfigArgs")]
    #[command(flatten)]
    pub config: ConfigArgs,
}

fn main() {
    #[cfg(feature = "tracing")]
    {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
            .with(EnvFilter::from_default_env())
            .init();
    }

    let cli = parse_cli();

    if let Err(e) = run(cli.command) {
        ui::print_error(&format!("{e:#}"));
        std::process::exit(ui::exit::ERROR);
    }
}

fn parse_cli() -> Cli {
    let cmd = Cli::command().about(build_about()).after_help(build_after_help());

    let matches = cmd.get_matches();

    #[expect(clippy::expect_used, reason = "clap already validated args; this cannot fail")]
    Cli::from_arg_matches(&matches).expect("failed to parse arguments")
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Run(args) => commands::run::run(&args),
        Command::Hooks(args) => commands::hooks::run(&args),
    }
}

fn build_about() -> String {
    format!(
        r"
  {} runs git hooks end to end.

  Each scenario gets a throwaway repository, a freshly installed hook,
  and a real commit, then checks exit status, branch, files and
  working-tree state.",
        colors::accent().apply_to("hookcheck").bold()
    )
}

fn build_after_help() -> String {
    format!(
        r"
  {}
    hookcheck run commit.toml               Run a scenario
    hookcheck run commit.toml -f json       Output the report as JSON
    hookcheck run commit.toml -t 5000       Kill commands after 5s
    hookcheck hooks                         List available hooks
    hookcheck hooks --hooks-dir hooks/      Include hooks from a directory

  Learn more: {}",
        style("Examples:").bold(),
        colors::accent().apply_to(REPO_URL).underlined()
    )
}
