use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Error, Result};
use futures::StreamExt;

use super::decode::Utf8StreamDecoder;
use super::relay::RelayClient;
use super::store::KeyValueStore;
use super::turn::{ERROR_TEXT, Role, Turn};
use crate::api::public::chat::{ChatRequest, Content};

/// Storage key holding the JSON encoded conversation
pub const HISTORY_KEY: &str = "chat-history";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendState {
    Idle,
    Sending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty input or a send was already in flight
    Ignored,
    Completed,
    Failed,
}

/// Reads the stored conversation. Missing or unreadable history is
/// an empty conversation.
pub fn load_history<S: KeyValueStore>(store: &S) -> Vec<Turn> {
    match store.get(HISTORY_KEY) {
        Ok(Some(raw)) => serde_json::from_str::<Vec<Turn>>(&raw).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed chat history: {}", e);
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!("Failed to read chat history: {}", e);
            Vec::new()
        }
    }
}

pub fn save_history<S: KeyValueStore>(store: &S, turns: &[Turn]) -> Result<()> {
    let raw = serde_json::to_string(turns)?;
    store.set(HISTORY_KEY, &raw)
}

/// A send that has been accepted. Holds the request for the relay
/// and the index of the assistant placeholder it streams into.
///
/// The session stays `Sending` for as long as this value lives.
/// Dropping it, including by dropping a `send_message` future part
/// way, returns the session to `Idle` and leaves the placeholder with
/// whatever text it had.
#[derive(Debug)]
pub struct PendingSend {
    request: ChatRequest,
    placeholder: usize,
    in_flight: Arc<AtomicBool>,
}

impl PendingSend {
    pub fn request(&self) -> &ChatRequest {
        &self.request
    }
}

impl Drop for PendingSend {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

/// A conversation with the relay, persisted to `store` after every
/// change.
pub struct ChatSession<S, C> {
    store: S,
    relay: C,
    turns: Vec<Turn>,
    in_flight: Arc<AtomicBool>,
}

impl<S: KeyValueStore, C: RelayClient> ChatSession<S, C> {
    pub fn load(store: S, relay: C) -> Self {
        let turns = load_history(&store);
        Self {
            store,
            relay,
            turns,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn state(&self) -> SendState {
        if self.in_flight.load(Ordering::SeqCst) {
            SendState::Sending
        } else {
            SendState::Idle
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Index of the user turn that prompted the latest reply, if the
    /// conversation ends with a user turn followed by one more turn.
    pub fn last_user_index(&self) -> Option<usize> {
        let idx = self.turns.len().checked_sub(2)?;
        (self.turns[idx].role == Role::User).then_some(idx)
    }

    pub fn clear(&mut self) {
        self.turns = Vec::new();
        self.persist();
    }

    /// Sends `text` to the relay and streams the reply into a new
    /// assistant turn. `on_update` is called with the conversation
    /// after every change made while streaming.
    pub async fn send_message<F>(&mut self, text: &str, mut on_update: F) -> SendOutcome
    where
        F: FnMut(&[Turn]),
    {
        let Some(pending) = self.begin_send(text) else {
            return SendOutcome::Ignored;
        };
        on_update(&self.turns);

        match self.stream_reply(&pending, &mut on_update).await {
            Ok(()) => {
                self.finish_send(pending);
                SendOutcome::Completed
            }
            Err(e) => {
                tracing::error!("Streaming error: {}", e);
                self.fail_send(pending);
                on_update(&self.turns);
                SendOutcome::Failed
            }
        }
    }

    /// Moves from `Idle` to `Sending`, appending the user turn and an
    /// empty assistant placeholder. Returns `None` without touching
    /// the conversation if `text` is blank or a send is in flight.
    pub fn begin_send(&mut self, text: &str) -> Option<PendingSend> {
        if text.trim().is_empty() || self.state() == SendState::Sending {
            return None;
        }

        let history = self.turns.iter().map(Content::from).collect();
        let request = ChatRequest {
            message: text.to_string(),
            history,
        };

        self.turns.push(Turn::user(text));
        self.persist();

        self.turns.push(Turn::ai(""));
        self.persist();

        self.in_flight.store(true, Ordering::SeqCst);

        Some(PendingSend {
            request,
            placeholder: self.turns.len() - 1,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Replaces the placeholder with a turn holding its text plus
    /// `fragment`.
    pub fn append_fragment(&mut self, pending: &PendingSend, fragment: &str) {
        let Some(current) = self.placeholder(pending) else {
            tracing::debug!("Dropping fragment for a cleared conversation");
            return;
        };
        let text = format!("{}{}", current.text, fragment);
        self.turns[pending.placeholder] = Turn::ai(&text);
        self.persist();
    }

    /// Ends the send, leaving the streamed reply in place.
    pub fn finish_send(&mut self, pending: PendingSend) {
        drop(pending);
    }

    /// Replaces whatever was streamed so far with the fixed error
    /// turn.
    pub fn fail_send(&mut self, pending: PendingSend) {
        if self.placeholder(&pending).is_some() {
            self.turns[pending.placeholder] = Turn::ai(ERROR_TEXT);
            self.persist();
        }
    }

    async fn stream_reply<F>(
        &mut self,
        pending: &PendingSend,
        on_update: &mut F,
    ) -> Result<(), Error>
    where
        F: FnMut(&[Turn]),
    {
        let mut stream = self.relay.send(&pending.request).await?;
        let mut decoder = Utf8StreamDecoder::new();

        while let Some(chunk) = stream.next().await {
            let fragment = decoder.decode(&chunk?);
            if !fragment.is_empty() {
                self.append_fragment(pending, &fragment);
                on_update(&self.turns);
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            self.append_fragment(pending, &tail);
            on_update(&self.turns);
        }

        Ok(())
    }

    fn placeholder(&self, pending: &PendingSend) -> Option<&Turn> {
        self.turns
            .get(pending.placeholder)
            .filter(|t| t.role == Role::Ai)
    }

    fn persist(&self) {
        if let Err(e) = save_history(&self.store, &self.turns) {
            tracing::error!("Failed to persist chat history: {}", e);
        }
    }
}
