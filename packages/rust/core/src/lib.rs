//! Task orchestration for SiteKiln.
//!
//! Expands named tasks into a step plan and runs it: clean, copy, styles,
//! HTML assembly, AMP validation, and the dev server.

pub mod clean;
pub mod copy;
pub mod runner;
pub mod tasks;

pub use runner::{ProgressReporter, RunSummary, Runner, SilentProgress, StepOutcome};
pub use tasks::{Step, Task, plan};
