//! Hosted generation backends.
//!
//! Each backend is a trait seam so the pipeline can be driven against fakes;
//! the reference clients speak the HTTP dialects of the services we deploy
//! against.

mod image;
mod speech;

pub use image::{ImageBackend, ImageRequest, SdWebuiClient};
pub use speech::{AudioEngine, SpeechBackend, SynthesizedAudio, TtsHttpClient};
