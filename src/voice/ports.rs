//! Speech port contracts
//!
//! The controller talks to synthesis and recognition exclusively through
//! these traits, so backends (terminal, HTTP speech APIs, test fakes) are
//! interchangeable and the state machine stays free of platform concerns.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::Result;
use crate::lang::Language;

/// One transcript event from a listening session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// In-progress, possibly-revised transcript fragment
    Partial(String),
    /// Terminal transcript; at most one per session, nothing follows it
    Final(String),
}

/// Speech synthesis port.
///
/// Implementations must resolve exactly once per call: when the utterance
/// has finished playing, or with an error. Cancellation happens by
/// dropping the future.
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Speak one utterance in the given language.
    ///
    /// # Errors
    ///
    /// Returns error if the synthesis backend fails.
    async fn speak(&self, text: &str, language: Language) -> Result<()>;
}

/// Speech recognition port.
///
/// `start_listening` opens a session that emits zero or more partial
/// transcripts followed by at most one final transcript. After
/// [`CancelListening::cancel`] the backend must stop emitting events for
/// that session.
pub trait SpeechInput: Send + Sync {
    /// Open a listening session bound to a language.
    ///
    /// # Errors
    ///
    /// Returns error if the recognition backend cannot start (e.g.
    /// permission denied, engine busy).
    fn start_listening(&self, language: Language) -> Result<ListeningSession>;
}

/// Handle to one active listening session
pub struct ListeningSession {
    events: mpsc::UnboundedReceiver<RecognitionEvent>,
    cancel: CancelListening,
}

impl ListeningSession {
    /// Pair a transcript event receiver with its cancellation handle
    #[must_use]
    pub fn new(
        events: mpsc::UnboundedReceiver<RecognitionEvent>,
        cancel: CancelListening,
    ) -> Self {
        Self { events, cancel }
    }

    /// Split into the event stream and the cancellation handle
    #[must_use]
    pub fn into_parts(self) -> (mpsc::UnboundedReceiver<RecognitionEvent>, CancelListening) {
        (self.events, self.cancel)
    }
}

/// Cancellation handle for a listening session.
///
/// Backends receive the paired [`oneshot::Receiver`] and must stop their
/// event stream when it fires (or when the session is dropped).
pub struct CancelListening(Option<oneshot::Sender<()>>);

impl CancelListening {
    /// Create a cancellation pair; hand the receiver to the backend task
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self(Some(tx)), rx)
    }

    /// Stop the session. Idempotent; safe to call after the stream ended.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for CancelListening {
    fn drop(&mut self) {
        self.cancel();
    }
}
