//! CLI command handlers.

mod context;
/// Listing of resolvable hooks.
pub mod hooks;
/// Scenario execution and reporting.
pub mod run;

/// Convenience alias for command return types.
pub type Result<T = ()> = anyhow::Result<T>;
