//! Ground truth: what each frame of a video looks like when nobody seeks.
//!
//! Seeking is what is under test, so the oracle is only ever built from a
//! strictly sequential traversal starting at frame 0.

pub mod cache;

use crate::error::VideoResult;
use crate::hashing::FrameDigest;
use crate::video::{Backend, LengthSource, ReaderOptions, SeekStrategy, SeekingReader, VideoReader};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Ordered frame number -> digest mapping, contiguous from 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroundTruth {
    frames: BTreeMap<usize, FrameDigest>,
}

impl GroundTruth {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, frame_number: usize) -> Option<FrameDigest> {
        self.frames.get(&frame_number).copied()
    }

    pub fn first(&self) -> Option<(usize, FrameDigest)> {
        self.frames.first_key_value().map(|(n, d)| (*n, *d))
    }

    pub fn last(&self) -> Option<(usize, FrameDigest)> {
        self.frames.last_key_value().map(|(n, d)| (*n, *d))
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, FrameDigest)> + '_ {
        self.frames.iter().map(|(n, d)| (*n, *d))
    }

    pub fn reverse_index(&self) -> ReverseIndex {
        let mut by_digest: HashMap<FrameDigest, Vec<usize>> = HashMap::new();
        for (n, digest) in self.iter() {
            by_digest.entry(digest).or_default().push(n);
        }
        ReverseIndex { by_digest }
    }

    fn record(&mut self, frame_number: usize, digest: FrameDigest) {
        self.frames.insert(frame_number, digest);
    }
}

/// Digest -> frame numbers carrying that content.
#[derive(Debug, Clone, Default)]
pub struct ReverseIndex {
    by_digest: HashMap<FrameDigest, Vec<usize>>,
}

impl ReverseIndex {
    /// Frame whose content is `digest`. Videos with repeated frames can have
    /// several; the one closest to `near` wins.
    pub fn locate(&self, digest: &FrameDigest, near: usize) -> Option<usize> {
        self.by_digest
            .get(digest)?
            .iter()
            .copied()
            .min_by_key(|&n| n.abs_diff(near))
    }
}

/// Which frame numbers a ground truth computation must cover.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FrameSelection {
    #[default]
    All,
    /// Frames `0..n`.
    First(usize),
    Numbers(BTreeSet<usize>),
}

impl FrameSelection {
    /// Exclusive end of the sequential traversal for a video of `length` frames.
    pub fn traversal_end(&self, length: usize) -> usize {
        match self {
            FrameSelection::All => length,
            FrameSelection::First(n) => (*n).min(length),
            FrameSelection::Numbers(set) => set
                .last()
                .map(|max| (max + 1).min(length))
                .unwrap_or(0),
        }
    }

    pub fn contains(&self, frame_number: usize) -> bool {
        match self {
            FrameSelection::All => true,
            FrameSelection::First(n) => frame_number < *n,
            FrameSelection::Numbers(set) => set.contains(&frame_number),
        }
    }
}

/// What to do when the backend stops producing frames before the length it
/// reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strictness {
    /// Keep what was read so far. Frame counts over-report often enough that
    /// this is the normal mode.
    #[default]
    Tolerant,
    /// Propagate the decode error.
    Strict,
}

/// Builds [`GroundTruth`] with a never-seeking reader.
pub struct GroundTruthComputer<'b, B: Backend> {
    backend: &'b B,
    selection: FrameSelection,
    strictness: Strictness,
    length_source: LengthSource,
}

impl<'b, B: Backend> GroundTruthComputer<'b, B> {
    pub fn new(backend: &'b B) -> Self {
        Self {
            backend,
            selection: FrameSelection::All,
            strictness: Strictness::Tolerant,
            length_source: LengthSource::default(),
        }
    }

    pub fn selection(mut self, selection: FrameSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    pub fn length_source(mut self, source: LengthSource) -> Self {
        self.length_source = source;
        self
    }

    pub fn compute(&self, path: &Path) -> VideoResult<GroundTruth> {
        self.compute_with(self.strictness, path)
    }

    /// Like [`GroundTruthComputer::compute`] with `strictness` overridden.
    pub fn compute_with(&self, strictness: Strictness, path: &Path) -> VideoResult<GroundTruth> {
        let options = ReaderOptions::new(SeekStrategy::Never)
            .double_check_seek(false)
            .length_source(self.length_source);
        let mut reader = SeekingReader::open(self.backend, path, options)?;
        collect_ground_truth(&mut reader, &self.selection, strictness)
    }
}

/// Read `reader` sequentially from its current position (expected to be 0)
/// and digest the selected frames. Never calls `seek`.
pub fn collect_ground_truth<R: VideoReader>(
    reader: &mut R,
    selection: &FrameSelection,
    strictness: Strictness,
) -> VideoResult<GroundTruth> {
    let length = reader.length()?;
    let end = selection.traversal_end(length);
    let mut truth = GroundTruth::default();

    while reader.next_frame_number() < end {
        match reader.next_frame() {
            Ok((frame_number, frame)) => {
                if selection.contains(frame_number) {
                    truth.record(frame_number, frame.digest());
                }
            }
            Err(e) if strictness == Strictness::Tolerant => {
                tracing::warn!(
                    "GroundTruth: could not read all frames of {:?}: {}. Frames from {} on are ignored",
                    reader.path(),
                    e,
                    reader.next_frame_number()
                );
                break;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        "GroundTruth: {} frames for {:?} (reported length {})",
        truth.len(),
        reader.path(),
        length
    );
    Ok(truth)
}
