//! JSON output formatter for scenario reports.

use std::io::Write as _;

use anyhow::Context as _;
use hookcheck_core::prelude::*;

/// Writes the full report as pretty-printed JSON to stdout.
pub fn write(report: &ScenarioReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("serialising report")?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}").context("writing report")?;

    Ok(())
}
