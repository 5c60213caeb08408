//! Lecture transcription.
//!
//! [`TranscriptionService`] runs a [`SpeechToText`] backend over each media
//! file of a lecture in sequence order and places every segment on one
//! continuous timeline, offset by the probed durations of earlier files.
//! Unlike document OCR, a single failed file fails the whole transcription.

mod chat_model;
mod error;
mod service;
mod traits;
mod types;
mod whisper;

pub use chat_model::ChatModelTranscriber;
pub use error::TranscriptionError;
pub use service::TranscriptionService;
pub use traits::SpeechToText;
pub use types::{
    overall_confidence, MediaDuration, MediaFile, RawSegment, StitchedSegment, SttOutput,
    TranscriptionOutput,
};
pub use whisper::WhisperApiTranscriber;
