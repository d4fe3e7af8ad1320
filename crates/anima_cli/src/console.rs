//! Console collaborators
//!
//! The CLI stands in for the speech collaborators: a rustyline reader
//! behind the `SpeechInput` contract (with a timeout so idle ticks
//! happen), and a stdout writer behind `SpeechOutput`.

use anima_core::{Emotion, Prosody, SpeechInput, SpeechOutput};
use async_trait::async_trait;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Reads lines on a dedicated thread so `listen` can time out and let
/// the main loop take idle ticks.
pub struct ConsoleInput {
    rx: Mutex<mpsc::Receiver<String>>,
}

impl ConsoleInput {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel::<String>(8);

        std::thread::spawn(move || {
            let mut editor = match DefaultEditor::new() {
                Ok(e) => e,
                Err(e) => {
                    tracing::error!("cannot open console editor: {}", e);
                    return;
                }
            };
            loop {
                match editor.readline("> ") {
                    Ok(line) => {
                        let _ = editor.add_history_entry(line.as_str());
                        if tx.blocking_send(line).is_err() {
                            return;
                        }
                    }
                    Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                        let _ = tx.blocking_send("quit".to_string());
                        return;
                    }
                    Err(e) => {
                        tracing::error!("console read error: {}", e);
                        return;
                    }
                }
            }
        });

        Self { rx: Mutex::new(rx) }
    }
}

#[async_trait]
impl SpeechInput for ConsoleInput {
    async fn listen(&self, timeout: Duration) -> Option<String> {
        let mut rx = self.rx.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }
}

/// Prints replies with their emotional coloring. A real TTS engine
/// would apply the prosody; the console shows it for transparency.
pub struct ConsoleOutput {
    pub persona: String,
}

#[async_trait]
impl SpeechOutput for ConsoleOutput {
    async fn speak(&self, text: &str, emotion: Emotion, prosody: Option<Prosody>) {
        match prosody.filter(|p| !p.is_neutral()) {
            Some(p) => println!(
                "\n{} [{} | rate {} pitch {}]: {}\n",
                self.persona, emotion, p.rate, p.pitch, text
            ),
            None => println!("\n{} [{}]: {}\n", self.persona, emotion, text),
        }
    }
}
