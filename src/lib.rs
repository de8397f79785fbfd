//! Math drill trainer - voice-interactive mental arithmetic
//!
//! This library provides the core of the trainer:
//! - Task generation (operations, difficulty ranges, session shuffling)
//! - The voice-interaction state machine (speak → listen → judge)
//! - Session control (scoring, progression, summaries)
//! - Transcript number extraction and localized feedback
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Presentation                        │
//! │   Terminal  │  snapshots (watch)  │  commands        │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               Session Controller                     │
//! │   task list  │  score tally  │  results  │  summary │
//! └────────────────────┬────────────────────────────────┘
//!                      │  one task at a time
//! ┌────────────────────▼────────────────────────────────┐
//! │          Voice-Interaction Controller                │
//! │   Speaking → AwaitingAnswer → Evaluating → Idle     │
//! └──────────┬─────────────────────────────┬───────────┘
//!            │                             │
//!     SpeechOutput port            SpeechInput port
//! ```
//!
//! Every asynchronous voice event is tagged with its session identifier;
//! stale events from an abandoned question are discarded by equality
//! check. See [`voice::VoiceController`].

pub mod config;
pub mod error;
pub mod lang;
pub mod session;
pub mod tasks;
pub mod voice;

pub use config::{Config, DrillConfig, VoiceConfig};
pub use error::{Error, Result};
pub use lang::{FeedbackKind, Language};
pub use session::{
    Outcome, SessionController, SessionHandle, SessionState, Snapshot, Summary, TaskResult,
};
pub use tasks::{Difficulty, Factor, Operation, Task};
pub use voice::{ConsoleVoice, SpeechInput, SpeechOutput, Verdict, VoiceController, VoiceHandle};
