//! Voice interaction module
//!
//! Half-duplex speak/listen protocol around one question at a time.
//! The controller is the state machine; backends plug in through the
//! [`SpeechOutput`] and [`SpeechInput`] ports.

mod console;
mod controller;
mod ports;
mod stt;
mod tts;

pub use console::ConsoleVoice;
pub use controller::{Phase, Verdict, VoiceController, VoiceHandle};
pub use ports::{CancelListening, ListeningSession, RecognitionEvent, SpeechInput, SpeechOutput};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
