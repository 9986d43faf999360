//! `review-agent` supervises one headless run of the review agent CLI.
//!
//! The agent is started with `--output-format stream-json`, its stdout is
//! decoded line by line into [`StreamEvent`]s, and the run is classified into
//! an [`Outcome`] once the child exits or the deadline fires.
//!
//! # Architecture
//!
//! ```text
//! RunConfig + prompt
//!     │
//!     ▼
//! AgentCommand   ← `claude -p … --output-format stream-json --allowedTools …`
//!     │             fixed AllowList, never derived from input
//!     ▼
//! supervise      ← stdout + stderr drained concurrently, raced against the deadline
//!     │
//!     ▼
//! RunLog         ← parser folds each line in: shell commands, tool errors, terminal result
//!     │
//!     ▼
//! RunReport      ← Outcome + RunLog + timing
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use review_agent::{run, RunConfig};
//!
//! let report = run(&config, "acme/repo#42", prompt).await;
//! if !report.outcome.is_success() {
//!     tracing::warn!(outcome = report.outcome.as_str(), "review did not complete");
//! }
//! ```

pub mod error;
pub mod parser;
pub mod process;
pub mod runner;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::AgentError;
pub use parser::{classify, RunLog};
pub use process::{AgentCommand, AllowList, ToolGrant};
pub use runner::{run, Outcome, RunConfig, RunReport, DUMMY_RESULT};
pub use types::{ContentBlock, EventKind, StreamEvent, TerminalResult, ToolResultContent};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, AgentError>;
