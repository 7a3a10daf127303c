//! Core scenario engine for hookcheck.
//!
//! This crate exercises git hooks end to end: it creates a disposable
//! repository, installs a named hook, commits through the real `git`
//! binary (which invokes the hook), then checks the resulting repository
//! state against declared expectations.
//!
//! # Main Types
//!
//! - [`Orchestrator`] - Runs a [`Scenario`] and produces a [`ScenarioReport`]
//! - [`Fixture`] - An isolated, self-removing git working directory
//! - [`HookRegistry`] - Hook names resolved to scripts or executables
//! - [`CommandRunner`] - Subprocess execution with timeout and cancellation
//! - [`Inspector`] - Branch, cleanliness, file and history queries
//! - [`Config`] - User configuration loaded from `.hookcheck.toml`
//!
//! # Error Handling
//!
//! Each component has its own [`thiserror`] enum ([`FixtureError`],
//! [`HookInstallError`], [`RunError`], [`InspectionError`],
//! [`ScenarioError`], [`ConfigError`]); [`HarnessError`] unifies them.
//! An expectation that does not hold is not an error but an
//! [`ExpectationMismatch`] on the report.
//!
//! The CLI crate (`hookcheck_cli`) uses `anyhow` for error propagation.

/// User configuration loaded from `.hookcheck.toml`.
pub mod config;
/// The top-level error type.
pub mod error;
pub mod expectation;
pub mod fixture;
pub mod hooks;
pub mod inspect;
pub mod orchestrator;
/// Common re-exports.
pub mod prelude;
pub mod runner;
pub mod scenario;
#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{Config, ConfigError, HookConfig};
pub use error::HarnessError;
pub use expectation::{Expectation, ExpectationMismatch};
pub use fixture::{Fixture, FixtureError, FixtureOptions, FixtureState};
pub use hooks::{HookInstallError, HookRef, HookRegistry, HookSource};
pub use inspect::{InspectionError, Inspector, RepositoryObservation, StatusEntry};
pub use orchestrator::{Orchestrator, Outcome, Phase, ScenarioReport};
pub use runner::{CancelToken, CommandRunner, ExecutionResult, Identity, RunError, RunOptions};
pub use scenario::{CommitRequest, Scenario, ScenarioError};

/// Default filename for hookcheck configuration.
pub const CONFIG_FILENAME: &str = ".hookcheck.toml";
