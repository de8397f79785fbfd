//! Drill session control
//!
//! Owns the ordered task list for a run, the score tally, and the
//! `NotStarted → Running → Completed` lifecycle. Delegates each question
//! to the voice controller and records exactly one result per task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::config::DrillConfig;
use crate::lang::{self, FeedbackKind};
use crate::tasks::{self, Task};
use crate::voice::{SpeechInput, SpeechOutput, Verdict, VoiceController, VoiceHandle};
use crate::{Error, Result};

/// Pause between the feedback for one task and the next question
const PACING_DELAY: Duration = Duration::from_millis(800);

/// Accuracy at or above which the final summary counts as a success
const SUCCESS_THRESHOLD: u32 = 70;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session has been started
    #[default]
    NotStarted,
    /// Tasks are being presented
    Running,
    /// All tasks exhausted, or ended externally
    Completed,
}

/// How a single task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Extracted answer matched
    Correct,
    /// Extracted answer did not match
    Incorrect,
    /// No usable answer before the deadline (includes backend failures)
    Timeout,
    /// Skipped by the user
    Skipped,
}

impl Outcome {
    /// Feedback category for presentation
    #[must_use]
    pub const fn feedback_kind(self) -> FeedbackKind {
        match self {
            Self::Correct => FeedbackKind::Success,
            Self::Incorrect => FeedbackKind::Error,
            Self::Timeout | Self::Skipped => FeedbackKind::Warning,
        }
    }
}

/// Immutable record of one answered task
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    /// The task that was asked
    pub task: Task,
    /// Raw recognized text, empty when nothing usable was heard
    pub heard: String,
    /// Extracted integer answer, if any
    pub answer: Option<i64>,
    /// How the task ended
    pub outcome: Outcome,
    /// Time from microphone open to resolution
    pub latency: Duration,
    /// When the result was recorded
    pub timestamp: DateTime<Utc>,
}

/// Mutable per-run aggregate
#[derive(Debug)]
struct DrillSession {
    tasks: Vec<Task>,
    cursor: usize,
    correct: usize,
    answered: usize,
    results: Vec<TaskResult>,
    started_at: DateTime<Utc>,
}

/// Final session summary
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// Correctly answered tasks
    pub correct: usize,
    /// Total recorded results
    pub total: usize,
    /// `round(correct / total * 100)`, 0 when nothing was answered
    pub accuracy_percent: u32,
    /// Mean latency over tasks that received an answer
    pub average_response: Option<Duration>,
    /// Wall-clock session duration
    pub duration: Duration,
    /// Localized summary line
    pub message: String,
    /// Success at [`SUCCESS_THRESHOLD`] and above, warning below
    pub kind: FeedbackKind,
    /// Per-task results in presentation order
    pub results: Vec<TaskResult>,
}

/// Read-only view published to the presentation layer
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    /// Session lifecycle state
    pub state: SessionState,
    /// Current question display text
    pub question: String,
    /// Current status/feedback message
    pub status: String,
    /// Category of the status message
    pub status_kind: Option<FeedbackKind>,
    /// Last recognized transcript
    pub heard: String,
    /// Whether a recognition session is open
    pub microphone_active: bool,
    /// Correct answers so far
    pub correct: usize,
    /// Recorded results so far
    pub answered: usize,
    /// Total tasks in the session
    pub total: usize,
}

/// Cloneable command handle for the presentation layer
#[derive(Debug, Clone)]
pub struct SessionHandle {
    voice: VoiceHandle,
    ended: Arc<AtomicBool>,
}

impl SessionHandle {
    /// Re-speak the current question
    pub fn repeat(&self) {
        self.voice.repeat();
    }

    /// Skip the current question
    pub fn skip(&self) {
        self.voice.skip();
    }

    /// End the session now; counters freeze and the summary is emitted
    /// from whatever was accumulated. Idempotent.
    pub fn end(&self) {
        self.ended.store(true, Ordering::SeqCst);
        self.voice.abort();
    }
}

/// Drives a full drill run: generation, presentation, scoring.
pub struct SessionController {
    voice: VoiceController,
    status: Arc<watch::Sender<Snapshot>>,
    state: SessionState,
    config: Option<DrillConfig>,
    session: Option<DrillSession>,
    ended: Arc<AtomicBool>,
}

impl SessionController {
    /// Create a controller over the given speech ports
    #[must_use]
    pub fn new(output: Arc<dyn SpeechOutput>, input: Arc<dyn SpeechInput>) -> Self {
        let status = Arc::new(watch::channel(Snapshot::default()).0);
        let voice = VoiceController::new(output, input, Arc::clone(&status));

        Self {
            voice,
            status,
            state: SessionState::NotStarted,
            config: None,
            session: None,
            ended: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Tasks generated for the running session
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        self.session.as_ref().map_or(&[], |s| &s.tasks)
    }

    /// Results recorded so far
    #[must_use]
    pub fn results(&self) -> &[TaskResult] {
        self.session.as_ref().map_or(&[], |s| &s.results)
    }

    /// Subscribe to presentation snapshots
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.status.subscribe()
    }

    /// Command handle usable from other tasks
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            voice: self.voice.handle(),
            ended: Arc::clone(&self.ended),
        }
    }

    /// Validate the configuration and generate the task list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid or a
    /// session is already running; the state stays untouched in both
    /// cases.
    pub fn start(&mut self, config: DrillConfig) -> Result<()> {
        if self.state == SessionState::Running {
            return Err(Error::Config("a session is already running".to_string()));
        }
        config.validate()?;

        let tasks = tasks::generate_session(
            &config.operations,
            config.difficulty,
            config.tasks_count,
            &mut rand::thread_rng(),
        )?;

        tracing::info!(
            tasks = tasks.len(),
            difficulty = ?config.difficulty,
            language = %config.language,
            time_limit = ?config.time_limit,
            "session started"
        );

        self.publish(|s| {
            *s = Snapshot {
                state: SessionState::Running,
                total: tasks.len(),
                ..Snapshot::default()
            };
        });

        self.session = Some(DrillSession {
            tasks,
            cursor: 0,
            correct: 0,
            answered: 0,
            results: Vec::new(),
            started_at: Utc::now(),
        });
        self.config = Some(config);
        self.ended.store(false, Ordering::SeqCst);
        self.state = SessionState::Running;
        Ok(())
    }

    /// Present tasks until the list is exhausted or the session is ended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no session was started, or
    /// [`Error::Channel`] if the voice controller's event queue breaks.
    pub async fn run(&mut self) -> Result<Summary> {
        if self.state != SessionState::Running {
            return Err(Error::Config("session not started".to_string()));
        }
        let config = self
            .config
            .clone()
            .ok_or_else(|| Error::Config("session not started".to_string()))?;

        loop {
            if self.ended.load(Ordering::SeqCst) {
                break;
            }

            let Some(task) = self.current_task() else {
                break;
            };

            self.publish(|s| {
                s.question = task.display_text();
                s.status.clear();
                s.status_kind = None;
                s.heard.clear();
            });

            let verdict = self
                .voice
                .run_task(&task, config.language, config.time_limit)
                .await?;

            let Some(verdict) = verdict else {
                // Aborted externally; freeze whatever was accumulated.
                break;
            };

            let more_left = self.record(task, verdict, &config);

            if more_left && !self.ended.load(Ordering::SeqCst) {
                tokio::time::sleep(PACING_DELAY).await;
            }
        }

        Ok(self.finish(&config))
    }

    fn current_task(&self) -> Option<Task> {
        self.session
            .as_ref()
            .and_then(|s| s.tasks.get(s.cursor).copied())
    }

    /// Append the result, update tallies and feedback. Returns whether
    /// tasks remain.
    fn record(&mut self, task: Task, verdict: Verdict, config: &DrillConfig) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        let Verdict { outcome, heard, answer, latency } = verdict;

        session.cursor += 1;
        session.answered += 1;
        if outcome == Outcome::Correct {
            session.correct += 1;
        }

        session.results.push(TaskResult {
            task,
            heard,
            answer,
            outcome,
            latency,
            timestamp: Utc::now(),
        });

        let message = match outcome {
            Outcome::Correct => {
                lang::praise(config.language, &mut rand::thread_rng()).to_string()
            }
            Outcome::Incorrect => lang::wrong_answer(config.language, task.answer),
            Outcome::Timeout | Outcome::Skipped => {
                lang::times_up(config.language, task.answer)
            }
        };

        tracing::info!(
            answered = session.answered,
            total = session.tasks.len(),
            correct = session.correct,
            outcome = ?outcome,
            "task recorded"
        );

        let (correct, answered) = (session.correct, session.answered);
        let remaining = session.cursor < session.tasks.len();

        self.publish(|s| {
            s.status = message;
            s.status_kind = Some(outcome.feedback_kind());
            s.correct = correct;
            s.answered = answered;
        });

        remaining
    }

    /// Freeze counters and build the final summary
    #[allow(clippy::cast_possible_truncation)]
    fn finish(&mut self, config: &DrillConfig) -> Summary {
        self.state = SessionState::Completed;

        let (correct, total, average_response, duration, results) =
            self.session.as_ref().map_or(
                (0, 0, None, Duration::ZERO, Vec::new()),
                |session| {
                    let answered: Vec<Duration> = session
                        .results
                        .iter()
                        .filter(|r| r.answer.is_some())
                        .map(|r| r.latency)
                        .collect();
                    let average = (!answered.is_empty())
                        .then(|| answered.iter().sum::<Duration>() / answered.len() as u32);
                    let duration = (Utc::now() - session.started_at)
                        .to_std()
                        .unwrap_or_default();
                    (
                        session.correct,
                        session.results.len(),
                        average,
                        duration,
                        session.results.clone(),
                    )
                },
            );

        let accuracy = accuracy_percent(correct, total);
        let message = lang::summary_line(config.language, correct, total, accuracy);
        let kind = if total > 0 && accuracy >= SUCCESS_THRESHOLD {
            FeedbackKind::Success
        } else {
            FeedbackKind::Warning
        };

        tracing::info!(correct, total, accuracy, "session completed");

        self.publish(|s| {
            s.state = SessionState::Completed;
            s.question.clear();
            s.status.clone_from(&message);
            s.status_kind = Some(kind);
            s.microphone_active = false;
        });

        Summary {
            correct,
            total,
            accuracy_percent: accuracy,
            average_response,
            duration,
            message,
            kind,
            results,
        }
    }

    fn publish(&self, update: impl FnOnce(&mut Snapshot)) {
        self.status.send_modify(update);
    }
}

/// `round(correct / total * 100)`, 0 when nothing was answered
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn accuracy_percent(correct: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        ((correct as f64 / total as f64) * 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_rounds_to_nearest() {
        assert_eq!(accuracy_percent(0, 0), 0);
        assert_eq!(accuracy_percent(5, 5), 100);
        assert_eq!(accuracy_percent(1, 3), 33);
        assert_eq!(accuracy_percent(2, 3), 67);
        assert_eq!(accuracy_percent(0, 4), 0);
    }

    #[test]
    fn outcome_feedback_kinds() {
        assert_eq!(Outcome::Correct.feedback_kind(), FeedbackKind::Success);
        assert_eq!(Outcome::Incorrect.feedback_kind(), FeedbackKind::Error);
        assert_eq!(Outcome::Timeout.feedback_kind(), FeedbackKind::Warning);
        assert_eq!(Outcome::Skipped.feedback_kind(), FeedbackKind::Warning);
    }
}
