use anyhow::Result;

use crate::session::{FileStore, Role, load_history, save_history};

pub fn print(history_path: &str) -> Result<()> {
    let store = FileStore::new(history_path)?;
    let turns = load_history(&store);
    if turns.is_empty() {
        println!("No chat history");
        return Ok(());
    }

    for turn in turns {
        let speaker = match turn.role {
            Role::User => "you",
            Role::Ai => "ai",
        };
        println!("{}> {}\n", speaker, turn.text);
    }
    Ok(())
}

pub fn clear(history_path: &str) -> Result<()> {
    let store = FileStore::new(history_path)?;
    save_history(&store, &[])?;
    println!("Chat history cleared");
    Ok(())
}
