//! Command Trait
//!
//! This module defines the [`Command`] trait shared by the `report` and
//! `check-flakes` commands. Each command resolves its own settings type from
//! CLI arguments and config (see [`crate::config`]) and produces a typed
//! outcome that callers can inspect programmatically.
//!
//! # Implementing a Command
//!
//! ```rust,no_run
//! use junit2jira_core::command::Command;
//! use junit2jira_core::error::Result;
//!
//! # #[derive(Clone, Debug)]
//! # struct CountSettings {
//! #     pub limit: usize,
//! # }
//! #
//! struct CountCommand;
//!
//! impl Command for CountCommand {
//!     type Settings = CountSettings;
//!     type Outcome = usize;
//!
//!     fn name() -> &'static str {
//!         "count"
//!     }
//!
//!     fn description() -> &'static str {
//!         "Counts up to a limit"
//!     }
//!
//!     fn execute(&self, settings: &CountSettings) -> Result<usize> {
//!         Ok(settings.limit)
//!     }
//! }
//! ```

use crate::error::Result;
use std::fmt::Debug;

/// Common interface of the CLI commands.
pub trait Command: Sized {
    /// Fully resolved inputs of the command.
    type Settings: Clone + Debug;

    /// What a successful run produced.
    type Outcome: Debug;

    /// Name used in logs, matching the CLI subcommand.
    fn name() -> &'static str;

    /// One-line human-readable description.
    fn description() -> &'static str;

    /// Runs the command and returns its outcome.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::TriageError`] when the run fails or its
    /// gate is not met.
    fn execute(&self, settings: &Self::Settings) -> Result<Self::Outcome>;

    /// Runs the command, logging its start and outcome.
    fn run(&self, settings: &Self::Settings) -> Result<()> {
        tracing::debug!(command = Self::name(), "running command");
        let outcome = self.execute(settings)?;
        tracing::debug!(command = Self::name(), ?outcome, "command finished");
        Ok(())
    }
}
