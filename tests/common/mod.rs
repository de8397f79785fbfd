//! Shared test utilities
//!
//! Scripted implementations of the speech ports, so the controllers can
//! be driven deterministically without audio hardware. Tests run under
//! paused tokio time; all delays here auto-advance.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use mathdrill::voice::{
    CancelListening, ListeningSession, RecognitionEvent, SpeechInput, SpeechOutput,
};
use mathdrill::{Error, Language, Result};

/// Script for one listening session
#[derive(Debug, Clone)]
pub enum Listen {
    /// Deliver one final transcript, then end the session
    Final(String),
    /// Deliver partial transcripts, then go quiet (debounce path)
    Partials(Vec<String>),
    /// Deliver nothing until cancelled (timeout path)
    Silence,
    /// Refuse to start listening
    Fail,
}

/// Scripted speech ports
pub struct FakeVoice {
    scripts: Mutex<VecDeque<Listen>>,
    utterances: Mutex<Vec<String>>,
    senders: Mutex<Vec<mpsc::UnboundedSender<RecognitionEvent>>>,
    /// Simulated utterance playback time
    pub speak_delay: Duration,
    /// Delay before each scripted transcript event
    pub event_delay: Duration,
    /// Synthesis fails instead of completing
    pub fail_speak: bool,
    /// Synthesis never completes (stuck backend)
    pub stuck_speech: bool,
    /// When false, sessions ignore cancellation (misbehaving backend)
    pub honor_cancel: bool,
}

impl FakeVoice {
    pub fn new(scripts: Vec<Listen>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            utterances: Mutex::new(Vec::new()),
            senders: Mutex::new(Vec::new()),
            speak_delay: Duration::from_millis(200),
            event_delay: Duration::from_millis(300),
            fail_speak: false,
            stuck_speech: false,
            honor_cancel: true,
        }
    }

    /// Append a listening script
    pub fn push(&self, script: Listen) {
        self.scripts.lock().unwrap().push_back(script);
    }

    /// Texts spoken so far
    pub fn utterances(&self) -> Vec<String> {
        self.utterances.lock().unwrap().clone()
    }

    /// Event sender of the n-th listening session, for injecting late
    /// events after the session was abandoned
    pub fn sender(&self, index: usize) -> mpsc::UnboundedSender<RecognitionEvent> {
        self.senders.lock().unwrap()[index].clone()
    }

    /// Number of listening sessions opened so far
    pub fn sessions_opened(&self) -> usize {
        self.senders.lock().unwrap().len()
    }
}

#[async_trait]
impl SpeechOutput for FakeVoice {
    async fn speak(&self, text: &str, _language: Language) -> Result<()> {
        self.utterances.lock().unwrap().push(text.to_string());

        if self.stuck_speech {
            std::future::pending::<()>().await;
        }
        if self.fail_speak {
            return Err(Error::Tts("synthesis unavailable".to_string()));
        }

        tokio::time::sleep(self.speak_delay).await;
        Ok(())
    }
}

impl SpeechInput for FakeVoice {
    fn start_listening(&self, _language: Language) -> Result<ListeningSession> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Listen::Silence);

        if matches!(script, Listen::Fail) {
            return Err(Error::Stt("microphone busy".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().push(tx.clone());
        let (cancel, mut cancelled) = CancelListening::channel();

        let honor_cancel = self.honor_cancel;
        let event_delay = self.event_delay;

        tokio::spawn(async move {
            let events: Vec<RecognitionEvent> = match script {
                Listen::Final(text) => vec![RecognitionEvent::Final(text)],
                Listen::Partials(texts) => {
                    texts.into_iter().map(RecognitionEvent::Partial).collect()
                }
                Listen::Silence | Listen::Fail => Vec::new(),
            };

            for event in events {
                if honor_cancel {
                    tokio::select! {
                        _ = &mut cancelled => return,
                        () = tokio::time::sleep(event_delay) => {}
                    }
                } else {
                    tokio::time::sleep(event_delay).await;
                }
                if tx.send(event).is_err() {
                    return;
                }
            }

            // A real recognizer stays live until cancelled
            if honor_cancel {
                let _ = cancelled.await;
            }
        });

        Ok(ListeningSession::new(rx, cancel))
    }
}
