use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Advisor,
}

impl Sender {
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Advisor => "Advisor",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { sender: Sender::User, text: text.into() }
    }

    pub fn advisor(text: impl Into<String>) -> Self {
        Self { sender: Sender::Advisor, text: text.into() }
    }
}
