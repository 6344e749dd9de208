use serde::{Deserialize, Serialize};

use crate::gemini::{self, Content};

/// Shown in place of a reply when sending or streaming fails
pub const ERROR_TEXT: &str = "⚠️ Something went wrong.";

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "ai")]
    Ai,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: &str) -> Self {
        Turn {
            role,
            text: text.to_string(),
        }
    }

    pub fn user(text: &str) -> Self {
        Turn::new(Role::User, text)
    }

    pub fn ai(text: &str) -> Self {
        Turn::new(Role::Ai, text)
    }
}

impl From<&Turn> for Content {
    fn from(turn: &Turn) -> Self {
        let role = match turn.role {
            Role::User => gemini::Role::User,
            Role::Ai => gemini::Role::Model,
        };
        Content::new(role, &turn.text)
    }
}
