//! Terminal speech backend
//!
//! Development backend that "speaks" by printing to stdout and "listens"
//! by reading lines from stdin, so the full drill loop runs end-to-end on
//! machines without audio hardware. Typed input arrives whole, so every
//! line is delivered as a final transcript.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::Result;
use crate::lang::Language;
use crate::voice::ports::{
    CancelListening, ListeningSession, RecognitionEvent, SpeechInput, SpeechOutput,
};

/// Simulated playback pace per spoken word
const WORD_PACE: Duration = Duration::from_millis(250);

/// Stdin/stdout implementation of both speech ports
pub struct ConsoleVoice {
    lines: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl ConsoleVoice {
    /// Create the backend and start the shared stdin reader
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        // Blocking reader thread; the channel closes when stdin does.
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        Self { lines: Arc::new(Mutex::new(rx)) }
    }
}

impl Default for ConsoleVoice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechOutput for ConsoleVoice {
    async fn speak(&self, text: &str, language: Language) -> Result<()> {
        println!("[{}] {text}", language.code());
        std::io::stdout().flush()?;

        // Pace the "utterance" so the answer prompt doesn't race it
        let words = u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX);
        tokio::time::sleep(WORD_PACE * words).await;
        Ok(())
    }
}

impl SpeechInput for ConsoleVoice {
    fn start_listening(&self, _language: Language) -> Result<ListeningSession> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (cancel, mut cancelled) = CancelListening::channel();
        let lines = Arc::clone(&self.lines);

        tokio::spawn(async move {
            // Exclusive claim on stdin for this session; released on
            // cancel or after the final transcript.
            let mut lines = lines.lock().await;
            loop {
                tokio::select! {
                    _ = &mut cancelled => break,
                    line = lines.recv() => {
                        let Some(line) = line else { break };
                        if line.trim().is_empty() {
                            continue;
                        }
                        let _ = events_tx.send(RecognitionEvent::Final(line));
                        break;
                    }
                }
            }
        });

        Ok(ListeningSession::new(events_rx, cancel))
    }
}
