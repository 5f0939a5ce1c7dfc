//! User interaction seam for install and removal confirmations.

use log::{debug, info};

use crate::error::Result;

/// How the repository talks back to whoever drives it.
#[cfg_attr(test, mockall::automock)]
pub trait InteractionStrategy: Send + Sync {
    /// Ask a yes/no question. `default_answer` is what a non-interactive
    /// strategy should answer.
    fn ask(&self, prompt: &str, default_answer: bool) -> Result<bool>;

    /// Report progress to the user.
    fn log_info(&self, message: &str);
}

/// Non-interactive strategy: every question gets its default answer and
/// progress goes to the log.
pub struct BatchInteraction;

impl InteractionStrategy for BatchInteraction {
    fn ask(&self, prompt: &str, default_answer: bool) -> Result<bool> {
        debug!("batch interaction, '{prompt}' answered {default_answer}");
        Ok(default_answer)
    }

    fn log_info(&self, message: &str) {
        info!("{message}");
    }
}
