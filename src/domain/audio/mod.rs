//! Audio input domain module

mod audio_file;
mod audio_format;

pub use audio_file::AudioFile;
pub use audio_format::{AudioFormat, SUPPORTED_FORMATS};
