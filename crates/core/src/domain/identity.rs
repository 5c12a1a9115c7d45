use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity token handed to the engine by the caller's session provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(email: impl Into<String>) -> Self {
        Self { email: email.into(), display_name: None }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Case-insensitive key used for usage metering.
    pub fn metering_key(&self) -> String {
        self.email.trim().to_ascii_lowercase()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(format!("NEG-{}", Uuid::new_v4()))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
