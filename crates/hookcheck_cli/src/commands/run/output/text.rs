//! Human-readable output for scenario reports.

use hookcheck_core::prelude::*;

use crate::ui::{colors, format_duration, indicators, pluralise_word, print_info, print_warning, truncate_with_ellipsis};

const MAX_OUTPUT_LINES: usize = 20;
const MAX_LINE_CHARS: usize = 160;

/// Prints the scenario verdict, each expectation, and diagnostics for
/// anything that went wrong.
pub fn write(scenario: &Scenario, report: &ScenarioReport) {
    print_headline(report);

    match &report.outcome {
        Outcome::Passed | Outcome::Failed { .. } => print_expectations(scenario, report.mismatches()),
        Outcome::Errored { phase, error } => print_error(*phase, error),
    }

    if !report.passed()
        && let Some(execution) = &report.execution
    {
        print_captured("stderr", &execution.stderr);
        print_captured("stdout", &execution.stdout);
    }

    if let Some(err) = &report.teardown_error {
        println!();
        print_warning(&format!("fixture not removed: {err}"));
    }

    println!();
    print_summary(report);
}

fn print_headline(report: &ScenarioReport) {
    let (indicator, style) = match report.outcome {
        Outcome::Passed => (indicators::SUCCESS, colors::success()),
        Outcome::Failed { .. } | Outcome::Errored { .. } => (indicators::ERROR, colors::error()),
    };

    println!(
        "{} {}  {}",
        style.apply_to(indicator),
        colors::primary().apply_to(&report.scenario),
        colors::muted().apply_to(format!("hook {}", report.hook))
    );
}

fn print_expectations(scenario: &Scenario, mismatches: &[ExpectationMismatch]) {
    if scenario.expectations.is_empty() {
        print_info("no expectations declared");
        return;
    }

    for expectation in &scenario.expectations {
        match mismatches.iter().find(|m| m.expectation == *expectation) {
            None => println!(
                "  {} {}",
                colors::success().apply_to(indicators::SUCCESS),
                colors::secondary().apply_to(expectation)
            ),
            Some(mismatch) => println!(
                "  {} {}  {}",
                colors::error().apply_to(indicators::ERROR),
                colors::emphasis().apply_to(expectation),
                colors::muted().apply_to(format!("expected {}, got {}", mismatch.expected, mismatch.actual))
            ),
        }
    }
}

fn print_error(phase: Phase, error: &HarnessError) {
    let detail = if error.is_timeout() {
        "timed out"
    } else if error.is_cancelled() {
        "cancelled"
    } else {
        "errored"
    };

    println!(
        "  {} {} {}",
        colors::error().apply_to(indicators::ERROR),
        colors::secondary().apply_to(format!("{detail} during {phase}:")),
        colors::emphasis().apply_to(error)
    );
}

fn print_captured(label: &str, output: &str) {
    let lines: Vec<&str> = output.lines().filter(|line| !line.trim().is_empty()).collect();
    if lines.is_empty() {
        return;
    }

    println!();
    println!("  {}", colors::muted().apply_to(format!("commit {label}:")));
    for line in lines.iter().take(MAX_OUTPUT_LINES) {
        println!("    {}", colors::code().apply_to(truncate_with_ellipsis(line, MAX_LINE_CHARS)));
    }

    if lines.len() > MAX_OUTPUT_LINES {
        let hidden = lines.len() - MAX_OUTPUT_LINES;
        println!(
            "    {}",
            colors::muted().apply_to(format!("… {hidden} more {}", pluralise_word(hidden, "line", "lines")))
        );
    }
}

fn print_summary(report: &ScenarioReport) {
    let verdict = match &report.outcome {
        Outcome::Passed => colors::success().apply_to("passed".to_string()),
        Outcome::Failed { mismatches } => {
            let count = mismatches.len();
            colors::error().apply_to(format!(
                "failed ({count} {})",
                pluralise_word(count, "expectation", "expectations")
            ))
        }
        Outcome::Errored { .. } => colors::error().apply_to("errored".to_string()),
    };

    let fixture = report.fixture.as_deref().unwrap_or("no fixture");
    println!(
        "{} {}",
        verdict,
        colors::muted().apply_to(format!("· {fixture} · {}", format_duration(report.elapsed)))
    );
}
