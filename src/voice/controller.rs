//! Voice-interaction controller
//!
//! Runs one speak→listen→judge cycle per task as a single serialized event
//! loop. Every asynchronous event (speech completion, transcripts, backend
//! failures) carries the identifier of the voice session that produced it,
//! and events whose identifier does not match the active session are
//! discarded. That equality check is what keeps a slow recognition result
//! from an abandoned question from being scored against the current one.
//!
//! The protocol is half-duplex: the controller never listens while it
//! speaks, and at most one recognition session is open at any time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Sleep};
use uuid::Uuid;

use crate::lang::{self, Language};
use crate::session::{Outcome, Snapshot};
use crate::tasks::Task;
use crate::voice::ports::{CancelListening, RecognitionEvent, SpeechInput, SpeechOutput};
use crate::{Error, Result};

/// Settle window after the last partial transcript before it is evaluated
const DEBOUNCE: Duration = Duration::from_millis(800);

/// Phase of the active voice session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No active speak/listen cycle
    #[default]
    Idle,
    /// Question utterance is playing
    Speaking,
    /// Microphone open, waiting for a recognizable answer
    AwaitingAnswer,
    /// Answer extracted, comparing against the task
    Evaluating,
}

/// Verdict for one completed task cycle
#[derive(Debug, Clone)]
pub struct Verdict {
    /// How the task ended
    pub outcome: Outcome,
    /// Raw recognized text, empty when nothing usable was heard
    pub heard: String,
    /// Extracted integer answer, if any
    pub answer: Option<i64>,
    /// Time from microphone open to resolution
    pub latency: Duration,
}

/// External command into the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Repeat,
    Skip,
    Abort,
}

/// Cloneable command handle for the presentation layer.
///
/// Commands are idempotent: duplicates drain harmlessly before the next
/// task begins, and commands sent while idle are ignored.
#[derive(Debug, Clone)]
pub struct VoiceHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl VoiceHandle {
    /// Re-speak the current question without consuming a task slot
    pub fn repeat(&self) {
        let _ = self.tx.send(Command::Repeat);
    }

    /// Force a `Skipped` verdict for the current task
    pub fn skip(&self) {
        let _ = self.tx.send(Command::Skip);
    }

    /// Tear down the current cycle without emitting a verdict
    pub fn abort(&self) {
        let _ = self.tx.send(Command::Abort);
    }
}

/// Event delivered to the controller loop, tagged with its voice session.
///
/// Speech events additionally carry an utterance generation, so the
/// completion of an utterance cancelled by `repeat()` cannot be mistaken
/// for the completion of its replacement.
#[derive(Debug)]
enum Event {
    SpokenDone { session: Uuid, utterance: u64 },
    SpeakFailed { session: Uuid, utterance: u64, error: String },
    Partial { session: Uuid, text: String },
    Final { session: Uuid, text: String },
    ListenFailed { session: Uuid, error: String },
}

impl Event {
    const fn session(&self) -> Uuid {
        match self {
            Self::SpokenDone { session, .. }
            | Self::SpeakFailed { session, .. }
            | Self::Partial { session, .. }
            | Self::Final { session, .. }
            | Self::ListenFailed { session, .. } => *session,
        }
    }
}

/// What woke the event loop
enum Wake {
    Event(Option<Event>),
    Command(Option<Command>),
    DebounceFired,
    DeadlineFired,
}

/// The voice-interaction state machine.
///
/// Owns the speech ports and the serialized event queue. State is only
/// ever mutated from [`VoiceController::run_task`]; external actors talk
/// to it through a [`VoiceHandle`].
pub struct VoiceController {
    output: Arc<dyn SpeechOutput>,
    input: Arc<dyn SpeechInput>,
    status: Arc<watch::Sender<Snapshot>>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    commands_tx: mpsc::UnboundedSender<Command>,
    commands_rx: mpsc::UnboundedReceiver<Command>,
    phase: Phase,
    utterance: u64,
    cancel_listen: Option<CancelListening>,
    speak_task: Option<JoinHandle<()>>,
}

impl VoiceController {
    /// Create a controller over the given speech ports
    #[must_use]
    pub fn new(
        output: Arc<dyn SpeechOutput>,
        input: Arc<dyn SpeechInput>,
        status: Arc<watch::Sender<Snapshot>>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        Self {
            output,
            input,
            status,
            events_tx,
            events_rx,
            commands_tx,
            commands_rx,
            phase: Phase::Idle,
            utterance: 0,
            cancel_listen: None,
            speak_task: None,
        }
    }

    /// Command handle usable from other tasks
    #[must_use]
    pub fn handle(&self) -> VoiceHandle {
        VoiceHandle { tx: self.commands_tx.clone() }
    }

    /// Current phase of the state machine
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Run one full speak→listen→judge cycle for a task.
    ///
    /// Returns `Ok(None)` when the cycle was aborted externally; otherwise
    /// exactly one verdict. Backend failures resolve to a `Timeout`
    /// verdict rather than an error, so one bad task never ends a session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Channel`] only if the internal event queue is
    /// unexpectedly closed.
    #[allow(clippy::too_many_lines)]
    pub async fn run_task(
        &mut self,
        task: &Task,
        language: Language,
        time_limit: Duration,
    ) -> Result<Option<Verdict>> {
        // Unconditional teardown of whatever came before, even if state
        // bookkeeping were inconsistent: stale listeners must never
        // survive into a new cycle.
        self.teardown();
        self.drain_commands();

        let session = Uuid::new_v4();
        self.phase = Phase::Speaking;
        self.publish(|s| {
            s.heard.clear();
            s.microphone_active = false;
        });
        self.begin_speaking(task, language, session);
        tracing::debug!(%session, question = %task.display_text(), "voice session started");

        let mut deadline: Option<Instant> = None;
        let mut debounce: Option<Instant> = None;
        let mut listen_opened: Option<Instant> = None;
        let mut pending_partial = String::new();
        let mut heard = String::new();

        loop {
            let wake = tokio::select! {
                event = self.events_rx.recv() => Wake::Event(event),
                command = self.commands_rx.recv() => Wake::Command(command),
                () = sleep_opt(debounce), if debounce.is_some() => Wake::DebounceFired,
                () = sleep_opt(deadline),
                    if deadline.is_some() && self.phase == Phase::AwaitingAnswer =>
                {
                    Wake::DeadlineFired
                }
            };

            match wake {
                Wake::Event(None) | Wake::Command(None) => {
                    return Err(Error::Channel("controller event queue closed".to_string()));
                }

                Wake::Event(Some(event)) => {
                    if event.session() != session {
                        tracing::trace!(
                            stale = %event.session(),
                            active = %session,
                            "discarding stale voice event"
                        );
                        continue;
                    }

                    match event {
                        Event::SpokenDone { utterance, .. }
                            if self.phase == Phase::Speaking && utterance == self.utterance =>
                        {
                            self.phase = Phase::AwaitingAnswer;
                            // The deadline is wall-clock per task; a repeat
                            // must not extend it.
                            if deadline.is_none() {
                                deadline = Some(Instant::now() + time_limit);
                            }
                            listen_opened.get_or_insert_with(Instant::now);
                            self.open_listening(language, session);
                        }
                        Event::Partial { text, .. } if self.phase == Phase::AwaitingAnswer => {
                            if !text.trim().is_empty() {
                                heard.clone_from(&text);
                                pending_partial = text;
                                debounce = Some(Instant::now() + DEBOUNCE);
                                self.publish(|s| s.heard.clone_from(&heard));
                            }
                        }
                        Event::Final { text, .. } if self.phase == Phase::AwaitingAnswer => {
                            heard.clone_from(&text);
                            debounce = None;
                            pending_partial.clear();
                            self.publish(|s| s.heard.clone_from(&heard));

                            if let Some(answer) = lang::extract_number(&text, language) {
                                return Ok(Some(self.judge(task, heard, answer, listen_opened)));
                            }
                            // No number in the final transcript. The
                            // recognizer session is spent, so open a fresh
                            // one and keep waiting for the deadline.
                            tracing::debug!(%session, text = %heard, "no number recognized, still listening");
                            self.open_listening(language, session);
                        }
                        Event::SpeakFailed { utterance, .. } if utterance != self.utterance => {
                            tracing::trace!(%session, "failure of a replaced utterance ignored");
                        }
                        Event::SpeakFailed { error, .. } | Event::ListenFailed { error, .. } => {
                            tracing::warn!(%session, error = %error, "voice backend failed, treating as timeout");
                            self.teardown();
                            return Ok(Some(Verdict {
                                outcome: Outcome::Timeout,
                                heard,
                                answer: None,
                                latency: elapsed_since(listen_opened),
                            }));
                        }
                        _ => {
                            tracing::trace!(%session, phase = ?self.phase, "event ignored in current phase");
                        }
                    }
                }

                Wake::Command(Some(command)) => match command {
                    Command::Repeat
                        if matches!(self.phase, Phase::Speaking | Phase::AwaitingAnswer) =>
                    {
                        // Half-duplex: close the microphone before speaking.
                        self.cancel_listening();
                        debounce = None;
                        pending_partial.clear();
                        self.phase = Phase::Speaking;
                        self.begin_speaking(task, language, session);
                        tracing::debug!(%session, "repeating question");
                    }
                    Command::Repeat => {}
                    Command::Skip => {
                        self.teardown();
                        tracing::debug!(%session, "task skipped");
                        return Ok(Some(Verdict {
                            outcome: Outcome::Skipped,
                            heard: String::new(),
                            answer: None,
                            latency: elapsed_since(listen_opened),
                        }));
                    }
                    Command::Abort => {
                        self.teardown();
                        tracing::debug!(%session, "voice session aborted");
                        return Ok(None);
                    }
                },

                Wake::DebounceFired => {
                    debounce = None;
                    let text = std::mem::take(&mut pending_partial);
                    if let Some(answer) = lang::extract_number(&text, language) {
                        return Ok(Some(self.judge(task, text, answer, listen_opened)));
                    }
                    // Noise only; the recognizer is still live, keep waiting.
                    tracing::trace!(%session, text = %text, "settled partial carried no number");
                }

                Wake::DeadlineFired => {
                    self.teardown();
                    tracing::info!(%session, "answer deadline reached");
                    return Ok(Some(Verdict {
                        outcome: Outcome::Timeout,
                        heard,
                        answer: None,
                        latency: time_limit,
                    }));
                }
            }
        }
    }

    /// Compare an extracted answer against the task and close the cycle
    fn judge(
        &mut self,
        task: &Task,
        heard: String,
        answer: i64,
        listen_opened: Option<Instant>,
    ) -> Verdict {
        self.phase = Phase::Evaluating;
        self.teardown();

        let outcome = if answer == task.answer { Outcome::Correct } else { Outcome::Incorrect };
        tracing::info!(answer, expected = task.answer, outcome = ?outcome, "answer evaluated");

        Verdict {
            outcome,
            heard,
            answer: Some(answer),
            latency: elapsed_since(listen_opened),
        }
    }

    /// Spawn the utterance; completion arrives on the event queue
    fn begin_speaking(&mut self, task: &Task, language: Language, session: Uuid) {
        if let Some(speaking) = self.speak_task.take() {
            speaking.abort();
        }
        self.utterance += 1;
        let utterance = self.utterance;

        let text = task.spoken_text(language);
        let output = Arc::clone(&self.output);
        let events = self.events_tx.clone();

        self.speak_task = Some(tokio::spawn(async move {
            let event = match output.speak(&text, language).await {
                Ok(()) => Event::SpokenDone { session, utterance },
                Err(e) => Event::SpeakFailed { session, utterance, error: e.to_string() },
            };
            let _ = events.send(event);
        }));
    }

    /// Open a recognition session, closing any existing one first
    fn open_listening(&mut self, language: Language, session: Uuid) {
        self.cancel_listening();

        match self.input.start_listening(language) {
            Ok(listening) => {
                let (mut transcripts, cancel) = listening.into_parts();
                self.cancel_listen = Some(cancel);
                self.publish(|s| s.microphone_active = true);

                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    while let Some(event) = transcripts.recv().await {
                        let tagged = match event {
                            RecognitionEvent::Partial(text) => Event::Partial { session, text },
                            RecognitionEvent::Final(text) => Event::Final { session, text },
                        };
                        if events.send(tagged).is_err() {
                            break;
                        }
                    }
                });
            }
            Err(e) => {
                let _ = self
                    .events_tx
                    .send(Event::ListenFailed { session, error: e.to_string() });
            }
        }
    }

    /// Close the recognition session, if any. Idempotent.
    fn cancel_listening(&mut self) {
        if let Some(mut cancel) = self.cancel_listen.take() {
            cancel.cancel();
        }
        self.publish(|s| s.microphone_active = false);
    }

    /// Cancel all in-flight work and return to `Idle`. Idempotent.
    fn teardown(&mut self) {
        if let Some(speaking) = self.speak_task.take() {
            speaking.abort();
        }
        self.cancel_listening();
        self.phase = Phase::Idle;
    }

    /// Drop commands queued against a previous task
    fn drain_commands(&mut self) {
        while self.commands_rx.try_recv().is_ok() {}
    }

    fn publish(&self, update: impl FnOnce(&mut Snapshot)) {
        self.status.send_modify(update);
    }
}

/// Sleep until an optional deadline; the `None` arm is never polled
/// (guarded in `select!`) but must still be constructible.
fn sleep_opt(deadline: Option<Instant>) -> Sleep {
    tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now))
}

fn elapsed_since(opened: Option<Instant>) -> Duration {
    opened.map_or(Duration::ZERO, |t| t.elapsed())
}
