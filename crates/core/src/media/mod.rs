//! Media probing and audio extraction.
//!
//! [`MediaProbe`] reports a media file's duration (ffprobe) and reduces video
//! to an audio track suitable for speech-to-text (ffmpeg). Both calls are
//! external processes killed when the job's [`CancelToken`] fires.
//!
//! [`CancelToken`]: crate::cancel::CancelToken

mod error;
mod ffmpeg;
mod traits;
mod types;

pub use error::MediaError;
pub use ffmpeg::FfmpegMedia;
pub use traits::MediaProbe;
pub use types::{MediaInfo, MediaKind};
