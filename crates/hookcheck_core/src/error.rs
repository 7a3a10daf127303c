use thiserror::Error;

use crate::config::ConfigError;
use crate::fixture::FixtureError;
use crate::hooks::HookInstallError;
use crate::inspect::InspectionError;
use crate::runner::RunError;
use crate::scenario::ScenarioError;

/// Top-level error type for a scenario run.
///
/// Unifies the component errors so the orchestrator can record whichever
/// one stopped a scenario, and so callers that load configuration and
/// scenarios have a single type to propagate.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A fixture could not be created or removed.
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    /// A hook could not be resolved or installed.
    #[error(transparent)]
    Hook(#[from] HookInstallError),

    /// A command could not be run to completion.
    #[error(transparent)]
    Run(#[from] RunError),

    /// Repository state could not be read.
    #[error(transparent)]
    Inspection(#[from] InspectionError),

    /// A scenario file could not be loaded.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// Configuration could not be read, parsed, or written.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl HarnessError {
    /// The runner error underneath this one, wherever it surfaced.
    #[must_use]
    pub fn run_error(&self) -> Option<&RunError> {
        match self {
            Self::Run(err)
            | Self::Inspection(InspectionError::Run(err))
            | Self::Fixture(FixtureError::Run { source: err, .. }) => Some(err),
            _ => None,
        }
    }

    /// Returns `true` if a command was killed for exceeding its deadline.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.run_error().is_some_and(RunError::is_timeout)
    }

    /// Returns `true` if a command was killed by cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.run_error().is_some_and(RunError::is_cancelled)
    }
}
