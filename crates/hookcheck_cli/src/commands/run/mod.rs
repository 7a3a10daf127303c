//! Run command - executes one scenario and reports the outcome.

mod output;

use anyhow::Context as _;
use hookcheck_core::prelude::*;

use super::context::HarnessContext;
use crate::ui::{create_spinner, exit, print_command_header};
use crate::{OutputFormat, RunArgs};

/// Executes the `hookcheck run` command.
///
/// Exits with [`exit::FAILED`] when an expectation does not hold and
/// [`exit::ERROR`] when the scenario could not be carried out.
pub fn run(args: &RunArgs) -> super::Result {
    let scenario = Scenario::load(&args.scenario).context("loading scenario")?;
    let orchestrator = build_orchestrator(args)?;

    let show_progress = matches!(args.format, OutputFormat::Text);
    if show_progress {
        print_command_header("run");
    }

    let spinner = show_progress.then(|| create_spinner(&format!("running {}", scenario.name)));
    let report = orchestrator.run(&scenario);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    match args.format {
        OutputFormat::Text => output::text::write(&scenario, &report),
        OutputFormat::Json => output::json::write(&report)?,
    }

    handle_exit_code(&report);
    Ok(())
}

fn build_orchestrator(args: &RunArgs) -> anyhow::Result<Orchestrator> {
    let mut context = HarnessContext::load(&args.config)?;

    if let Some(git) = &args.git {
        context.config.git.clone_from(git);
    }
    if let Some(timeout) = args.timeout {
        context.config.timeout_ms = Some(timeout);
    }

    context.orchestrator()
}

fn handle_exit_code(report: &ScenarioReport) {
    match report.outcome {
        Outcome::Passed => {}
        Outcome::Failed { .. } => std::process::exit(exit::FAILED),
        Outcome::Errored { .. } => std::process::exit(exit::ERROR),
    }
}
