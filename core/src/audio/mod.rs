// Output sinks for synthesized WAV payloads

pub mod file;
pub mod playback;

pub use file::write_wav_atomic;
pub use playback::{AudioPlayer, CommandPlayer};
