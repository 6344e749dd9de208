use std::io::{self, Write};

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::session::{
    ChatSession, ERROR_TEXT, FileStore, HttpRelayClient, Role, SendOutcome, Turn,
};

const THINKING: &str = "Thinking...";

pub async fn run(relay_url: &str, history_path: &str) -> Result<()> {
    // Keep logs out of the way of streamed output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(io::stderr)
        .init();

    let mut rl = DefaultEditor::new()?;
    let store = FileStore::new(history_path)?;
    let mut session = ChatSession::load(store, HttpRelayClient::new(relay_url));

    for turn in session.turns() {
        print_turn(turn);
    }

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                if line.trim() == "/clear" {
                    session.clear();
                    println!("Chat history cleared");
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                print!("{}", THINKING);
                io::stdout().flush()?;

                let mut shown = String::new();
                let outcome = session
                    .send_message(&line, |turns| print_delta(turns, &mut shown))
                    .await;

                match outcome {
                    SendOutcome::Completed => println!("\n"),
                    SendOutcome::Failed => {
                        if shown.is_empty() {
                            clear_line();
                        } else {
                            println!();
                        }
                        println!("{}\n", ERROR_TEXT);
                    }
                    SendOutcome::Ignored => clear_line(),
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

/// Prints whatever the reply gained since the last update.
fn print_delta(turns: &[Turn], shown: &mut String) {
    let Some(last) = turns.last().filter(|t| t.role == Role::Ai) else {
        return;
    };
    // Failures are reported once the send returns
    if last.text.is_empty()
        || last.text == ERROR_TEXT
        || !last.text.starts_with(shown.as_str())
    {
        return;
    }
    if shown.is_empty() {
        clear_line();
    }
    print!("{}", &last.text[shown.len()..]);
    let _ = io::stdout().flush();
    *shown = last.text.clone();
}

fn print_turn(turn: &Turn) {
    match turn.role {
        Role::User => println!(">>> {}", turn.text),
        Role::Ai => println!("{}\n", turn.text),
    }
}

fn clear_line() {
    print!("\r{}\r", " ".repeat(THINKING.len()));
    let _ = io::stdout().flush();
}
