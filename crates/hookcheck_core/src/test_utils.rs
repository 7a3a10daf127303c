//! Test utilities for `hookcheck_core` (compiled only during testing).

use crate::expectation::Expectation;
use crate::fixture::{Fixture, FixtureOptions};
use crate::hooks::HookRegistry;
use crate::orchestrator::Orchestrator;
use crate::runner::CommandRunner;
use crate::scenario::{CommitRequest, Scenario};

pub fn runner() -> CommandRunner {
    CommandRunner::default()
}

pub fn fixture() -> Fixture {
    Fixture::create(&runner(), &FixtureOptions::default()).unwrap()
}

pub fn orchestrator() -> Orchestrator {
    Orchestrator::new(HookRegistry::builtin(), runner())
}

/// The canonical "successful commit" scenario, installing `hook`.
pub fn scenario(hook: &str) -> Scenario {
    Scenario {
        name: format!("commit with {hook}"),
        hook: hook.to_string(),
        commit: CommitRequest::new("successful submission", "[Topic] Message subject.\n"),
        expectations: vec![
            Expectation::ExitStatus(0),
            Expectation::Branch("main".into()),
            Expectation::FileExists("successful submission".into()),
            Expectation::Clean(true),
        ],
        timeout_ms: None,
    }
}
