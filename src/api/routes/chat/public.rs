//! Public types for the chat API
use serde::{Deserialize, Serialize};

pub use crate::gemini::{Content, Part, Role};

/// Body of `POST /api/chat`. `history` holds the prior turns in
/// chronological order and does not include `message`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<Content>,
}

impl ChatRequest {
    /// Everything the provider needs to produce the next turn.
    pub fn contents(&self) -> Vec<Content> {
        let mut contents = self.history.clone();
        contents.push(Content::new(Role::User, &self.message));
        contents
    }
}
