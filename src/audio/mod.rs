//! Audio track list handed to the synthesis.

mod tracks;

pub use tracks::{AudioTrack, collect_audio_tracks};
