//! Domain layer for the Fedor review service.
//!
//! Everything here is synchronous and side-effect free apart from reading
//! the configuration file: configuration, webhook authentication, event
//! classification, review targets and the agent prompt.

pub mod config;
pub mod error;
pub mod intake;
pub mod prompt;
pub mod signature;
pub mod target;

pub use config::{Config, ConfigWarning, WarnLevel};
pub use error::{FedorError, Result};
pub use intake::{classify, Decision, IntakeRules, Trigger, WebhookPayload};
pub use prompt::{operation_of, render_prompt, Operation};
pub use target::Target;
