//! Frame-accurate seek verification for video decoding backends.
//!
//! A [`truth::GroundTruth`] is computed by decoding a video sequentially
//! without ever seeking. [`verify::SeekVerifier`] then requests sampled
//! frames through a [`video::SeekingReader`] configured with a
//! [`video::SeekStrategy`] and compares content digests, classifying every
//! mismatch and checking it against the [`verify::known_problems`] registry.

pub mod error;
pub mod hashing;
pub mod sources;
pub mod truth;
pub mod verify;
pub mod video;

pub use error::{VideoError, VideoResult};
pub use hashing::{hash_frame, FrameDigest};
