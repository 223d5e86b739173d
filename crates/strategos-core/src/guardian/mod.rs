//! Guardian - Continuous Validation
//!
//! The guardian keeps a project under continuous watch: file changes are
//! queued, validated in batches through the validation agent, and optionally
//! auto-fixed. Explicit pre-commit and pre-deploy gates apply configurable
//! blocking thresholds per issue severity.
//!
//! # Module Structure
//!
//! - `config`: guardian settings and blocking thresholds
//! - `engine`: lifecycle, batch worker, and the validation gates
//! - `watcher`: glob-based file filter and filesystem change watcher

mod config;
mod engine;
mod watcher;

#[cfg(test)]
mod tests;

pub use config::{BlockingThresholds, GuardianConfig};
pub use engine::{CommitCheck, DeployCheck, GuardianEngine, GuardianState, GuardianStatus};
pub use watcher::{ChangeWatcher, FileFilter};
