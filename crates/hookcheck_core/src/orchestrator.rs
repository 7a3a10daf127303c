//! Drives one scenario through setup, action, assertion and teardown.

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
#[cfg(feature = "tracing")]
use tracing::{trace, warn};

use crate::config::Config;
use crate::error::HarnessError;
use crate::expectation::{ExpectationMismatch, evaluate_all};
use crate::fixture::{Fixture, FixtureError, FixtureOptions};
use crate::hooks::{self, HookRef, HookRegistry};
use crate::inspect::{Inspector, RepositoryObservation};
use crate::runner::{CancelToken, CommandRunner, ExecutionResult, RunOptions, serialize_millis};
use crate::scenario::Scenario;

/// Pipeline stage of a scenario run. Stages only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Resolving the hook, creating the fixture, installing the hook.
    Setup,
    /// Writing, staging and committing.
    Acting,
    /// Inspecting the repository and evaluating expectations.
    Asserting,
    /// Removing the fixture.
    Teardown,
    /// Finished.
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Setup => "setup",
            Self::Acting => "acting",
            Self::Asserting => "asserting",
            Self::Teardown => "teardown",
            Self::Done => "done",
        })
    }
}

/// How a scenario ended.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Every expectation held.
    Passed,
    /// The scenario ran, but some expectations did not hold.
    Failed {
        /// Every expectation that did not hold, in declaration order.
        mismatches: Vec<ExpectationMismatch>,
    },
    /// A component error stopped the scenario before it could be judged.
    Errored {
        /// The stage that failed.
        phase: Phase,
        /// What went wrong.
        #[serde(serialize_with = "serialize_display")]
        error: HarnessError,
    },
}

/// Everything known about one scenario run.
#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub scenario: String,
    /// Hook the scenario asked for.
    pub hook: String,
    /// Fixture name, once one was created.
    pub fixture: Option<String>,
    /// Last stage reached.
    pub phase: Phase,
    /// Verdict.
    pub outcome: Outcome,
    /// Result of the commit, if it ran to completion.
    pub execution: Option<ExecutionResult>,
    /// Repository state after the commit, if it could be read.
    pub observation: Option<RepositoryObservation>,
    /// Failure to remove the fixture. Never replaces `outcome`.
    #[serde(serialize_with = "serialize_optional_display")]
    pub teardown_error: Option<FixtureError>,
    /// Wall-clock start time.
    pub started_at: DateTime<Utc>,
    /// Total time including teardown.
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl ScenarioReport {
    fn new(scenario: &Scenario) -> Self {
        Self {
            scenario: scenario.name.clone(),
            hook: scenario.hook.clone(),
            fixture: None,
            phase: Phase::Setup,
            outcome: Outcome::Passed,
            execution: None,
            observation: None,
            teardown_error: None,
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
        }
    }

    /// Returns `true` when every expectation held.
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self.outcome, Outcome::Passed)
    }

    /// Mismatched expectations; empty unless the outcome is `Failed`.
    #[must_use]
    pub fn mismatches(&self) -> &[ExpectationMismatch] {
        match &self.outcome {
            Outcome::Failed { mismatches } => mismatches,
            _ => &[],
        }
    }

    /// The error that stopped the scenario, if any.
    #[must_use]
    pub fn error(&self) -> Option<&HarnessError> {
        match &self.outcome {
            Outcome::Errored { error, .. } => Some(error),
            _ => None,
        }
    }

    fn enter(&mut self, phase: Phase) {
        #[cfg(feature = "tracing")]
        trace!(scenario = %self.scenario, from = %self.phase, to = %phase, "phase transition");

        self.phase = phase;
    }
}

/// Runs scenarios against fresh fixtures.
///
/// An orchestrator is immutable once built and may be shared between
/// threads; every run gets its own fixture.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: HookRegistry,
    runner: CommandRunner,
    fixture_options: FixtureOptions,
    default_timeout: Option<Duration>,
}

impl Orchestrator {
    /// Creates an orchestrator with default fixture options and no timeout.
    #[must_use]
    pub fn new(registry: HookRegistry, runner: CommandRunner) -> Self {
        Self {
            registry,
            runner,
            fixture_options: FixtureOptions::default(),
            default_timeout: None,
        }
    }

    /// Builds the registry, runner and defaults from `config`. Relative
    /// paths in the configuration resolve against `base_dir`.
    pub fn from_config(config: &Config, base_dir: &Path) -> Result<Self, HarnessError> {
        let registry = HookRegistry::from_config(config, base_dir)?;

        Ok(Self::new(registry, config.runner())
            .with_fixture_options(config.fixture_options())
            .with_default_timeout(config.timeout()))
    }

    /// Deadline applied to each command when the scenario sets none.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Options used for every fixture this orchestrator creates.
    #[must_use]
    pub fn with_fixture_options(mut self, options: FixtureOptions) -> Self {
        self.fixture_options = options;
        self
    }

    /// The hooks scenarios can name.
    #[must_use]
    pub const fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    /// The runner used for git and hooks.
    #[must_use]
    pub const fn runner(&self) -> &CommandRunner {
        &self.runner
    }

    /// Runs `scenario` to completion.
    #[must_use]
    pub fn run(&self, scenario: &Scenario) -> ScenarioReport {
        self.execute(scenario, None)
    }

    /// Runs `scenario`, killing any in-flight command once `cancel` fires.
    /// The fixture is still removed.
    #[must_use]
    pub fn run_with_cancel(&self, scenario: &Scenario, cancel: &CancelToken) -> ScenarioReport {
        self.execute(scenario, Some(cancel.clone()))
    }

    fn execute(&self, scenario: &Scenario, cancel: Option<CancelToken>) -> ScenarioReport {
        let start = Instant::now();
        let mut report = ScenarioReport::new(scenario);

        let mut options = RunOptions::default().with_timeout(scenario.timeout().or(self.default_timeout));
        if let Some(cancel) = cancel {
            options = options.with_cancel(cancel);
        }

        let prepared = self
            .registry
            .resolve(&scenario.hook)
            .and_then(|hook| hook.validate().map(|()| hook))
            .map_err(HarnessError::from)
            .and_then(|hook| Ok((hook, Fixture::create(&self.runner, &self.fixture_options)?)));

        match prepared {
            Ok((hook, mut fixture)) => {
                report.fixture = Some(fixture.name().to_string());
                let outcome = self.exercise(&fixture, hook, scenario, &options, &mut report);
                report.outcome = outcome;

                report.enter(Phase::Teardown);
                if let Err(err) = fixture.destroy() {
                    #[cfg(feature = "tracing")]
                    warn!(scenario = %report.scenario, error = %err, "fixture teardown failed");

                    report.teardown_error = Some(err);
                }
            }
            Err(error) => {
                report.outcome = Outcome::Errored {
                    phase: Phase::Setup,
                    error,
                };
            }
        }

        report.enter(Phase::Done);
        report.elapsed = start.elapsed();
        report
    }

    fn exercise(
        &self,
        fixture: &Fixture,
        hook: &HookRef,
        scenario: &Scenario,
        options: &RunOptions,
        report: &mut ScenarioReport,
    ) -> Outcome {
        let errored = |phase, error: HarnessError| Outcome::Errored { phase, error };

        if let Err(err) = hooks::install(fixture, hook) {
            return errored(Phase::Setup, err.into());
        }

        report.enter(Phase::Acting);
        let result = match self.runner.commit_file(fixture, &scenario.commit, options) {
            Ok(result) => result,
            Err(err) => return errored(Phase::Acting, err.into()),
        };

        report.enter(Phase::Asserting);
        let inspector = Inspector::new(&self.runner, options);
        let observation = match inspector.observe(fixture, &scenario.probed_paths()) {
            Ok(observation) => observation,
            Err(err) => {
                report.execution = Some(result);
                return errored(Phase::Asserting, err.into());
            }
        };

        let mismatches = evaluate_all(&scenario.expectations, &result, &observation);
        report.execution = Some(result);
        report.observation = Some(observation);

        if mismatches.is_empty() {
            Outcome::Passed
        } else {
            Outcome::Failed { mismatches }
        }
    }
}

fn serialize_display<S: Serializer, T: fmt::Display>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[allow(clippy::ref_option, reason = "signature required by serde's serialize_with")]
fn serialize_optional_display<S: Serializer, T: fmt::Display>(
    value: &Option<T>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => serializer.collect_str(value),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectation::Expectation;
    use crate::hooks::HookInstallError;
    use crate::runner::RunError;
    use crate::scenario::CommitRequest;
    use crate::test_utils::{orchestrator, scenario};

    #[test]
    fn canonical_scenario_passes() {
        let report = orchestrator().run(&scenario("pre-commit"));

        assert!(report.passed(), "{:?}", report.outcome);
        assert_eq!(report.phase, Phase::Done);
        assert_eq!(report.execution.as_ref().unwrap().status, 0);
        assert!(report.fixture.is_some());
        assert!(report.teardown_error.is_none());
    }

    #[test]
    fn rejecting_hook_fails_every_dependent_expectation() {
        let report = orchestrator().run(&scenario("reject"));

        let failed: Vec<&Expectation> = report.mismatches().iter().map(|m| &m.expectation).collect();
        assert_eq!(failed, vec![&Expectation::ExitStatus(0), &Expectation::Clean(true)]);

        let observation = report.observation.as_ref().unwrap();
        assert_eq!(observation.commit_count, 0);
        assert_eq!(observation.file_exists("successful submission"), Some(true));
    }

    #[test]
    fn unknown_hook_errors_before_fixture_exists() {
        let report = orchestrator().run(&scenario("no-such-hook"));

        assert!(matches!(
            report.outcome,
            Outcome::Errored {
                phase: Phase::Setup,
                error: HarnessError::Hook(_)
            }
        ));
        assert!(report.fixture.is_none());
        assert!(report.execution.is_none());
    }

    #[test]
    fn missing_hook_file_errors_before_fixture_exists() {
        let mut registry = HookRegistry::builtin();
        registry.register(HookRef::file("gone", "pre-commit", "/nonexistent/hooks/gone"));
        let orchestrator = Orchestrator::new(registry, CommandRunner::default());

        let report = orchestrator.run(&scenario("gone"));

        assert!(matches!(
            report.outcome,
            Outcome::Errored {
                phase: Phase::Setup,
                error: HarnessError::Hook(HookInstallError::MissingSource { .. })
            }
        ));
        assert!(report.fixture.is_none());
    }

    #[test]
    fn hanging_hook_times_out() {
        let mut hanging = scenario("hang");
        hanging.timeout_ms = Some(300);

        let report = orchestrator().run(&hanging);

        assert!(matches!(report.outcome, Outcome::Errored { phase: Phase::Acting, .. }));
        assert!(report.error().unwrap().is_timeout());
        assert!(report.teardown_error.is_none());
    }

    #[test]
    fn scenario_timeout_overrides_default() {
        let mut hanging = scenario("hang");
        hanging.timeout_ms = Some(200);

        let report = orchestrator()
            .with_default_timeout(Some(Duration::from_secs(600)))
            .run(&hanging);

        assert!(matches!(
            report.error().and_then(HarnessError::run_error),
            Some(RunError::Timeout { timeout, .. }) if *timeout == Duration::from_millis(200)
        ));
    }

    #[test]
    fn pre_cancelled_token_stops_the_commit() {
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = orchestrator().run_with_cancel(&scenario("hang"), &cancel);

        assert!(report.error().unwrap().is_cancelled());
        assert_eq!(report.phase, Phase::Done);
    }

    #[test]
    fn nested_commit_path_is_created() {
        let mut nested = scenario("accept");
        nested.commit = CommitRequest::new("docs/notes/today.md", "Add notes");
        nested.expectations = vec![
            Expectation::FileExists("docs/notes/today.md".into()),
            Expectation::CommitCount(1),
        ];

        let report = orchestrator().run(&nested);
        assert!(report.passed(), "{:?}", report.outcome);
    }
}
