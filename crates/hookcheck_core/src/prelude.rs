//! Convenience re-exports of the most commonly used types.

pub use crate::config::{Config, ConfigError};
pub use crate::error::HarnessError;
pub use crate::expectation::{Expectation, ExpectationMismatch};
pub use crate::fixture::{Fixture, FixtureError, FixtureOptions};
pub use crate::hooks::{HookInstallError, HookRef, HookRegistry, HookSource};
pub use crate::inspect::{InspectionError, Inspector, RepositoryObservation, StatusEntry};
pub use crate::orchestrator::{Orchestrator, Outcome, Phase, ScenarioReport};
pub use crate::runner::{CancelToken, CommandRunner, ExecutionResult, RunError, RunOptions};
pub use crate::scenario::{CommitRequest, Scenario, ScenarioError};
