//! Client side of the chat: conversation state, persistence and the
//! streaming reader for relay responses.

mod core;
mod decode;
mod relay;
pub mod scroll;
mod store;
mod turn;

pub use self::core::{
    ChatSession, HISTORY_KEY, PendingSend, SendOutcome, SendState, load_history, save_history,
};
pub use self::decode::Utf8StreamDecoder;
pub use self::relay::{ByteStream, HttpRelayClient, RelayClient};
pub use self::store::{FileStore, KeyValueStore, MemoryStore};
pub use self::turn::{ERROR_TEXT, Role, Turn};
