//! Scenario fixtures, a scenario runner, and structured JSONL logging for
//! exercising the SHE protocol engine end to end.

pub mod fixtures;
pub mod scenarios;
pub mod structured_log;

pub use fixtures::{builtin_scenarios, ScenarioCase, ScenarioSet, ScenarioStep};
pub use scenarios::{run_by_name, Report, StepResult};
pub use structured_log::{LogEmitter, LogEntry, LogLevel};
