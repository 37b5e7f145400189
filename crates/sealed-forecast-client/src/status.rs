//! User-facing status reporting.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a status message is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCategory {
    Submission,
    Decryption,
    Authorization,
    /// Progress, not a failure.
    Info,
}

/// A status line shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub category: StatusCategory,
    pub message: String,
}

impl Status {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            category: StatusCategory::Info,
            message: message.into(),
        }
    }

    pub fn failure(category: StatusCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.category != StatusCategory::Info
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
