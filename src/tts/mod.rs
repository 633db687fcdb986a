//! Optional speech synthesis for spoken feedback.

pub mod elevenlabs;

pub use elevenlabs::{SpeechSynthesizer, TtsError};
