//! Combinations of (strategy, video, oracle source) that are allowed to fail.
//!
//! The list is hand-maintained. A listed combination that starts passing fails
//! the run, so fixes in a decoder have to be acknowledged here explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where the expected digests of a run come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleSource {
    /// Loaded from the ground truth cache.
    Precomputed,
    /// Computed during this run with a never-seeking reader.
    Online,
}

impl OracleSource {
    pub const ALL: [OracleSource; 2] = [OracleSource::Precomputed, OracleSource::Online];

    pub fn id(&self) -> &'static str {
        match self {
            OracleSource::Precomputed => "precomputed",
            OracleSource::Online => "online",
        }
    }
}

impl fmt::Display for OracleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for OracleSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "precomputed" => Ok(OracleSource::Precomputed),
            "online" => Ok(OracleSource::Online),
            other => Err(format!(
                "unknown expectation source {:?}; use \"precomputed\" or \"online\"",
                other
            )),
        }
    }
}

/// One verified combination: `{backend}-{strategy id}`, video file name and
/// oracle source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combination {
    pub strategy: String,
    pub video: String,
    pub oracle: OracleSource,
}

impl Combination {
    pub fn new(strategy: impl Into<String>, video: impl Into<String>, oracle: OracleSource) -> Self {
        Self {
            strategy: strategy.into(),
            video: video.into(),
            oracle,
        }
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-expectations={}",
            self.strategy, self.video, self.oracle
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownProblem {
    pub strategy: &'static str,
    pub video: &'static str,
    pub oracle: OracleSource,
    pub note: &'static str,
}

impl KnownProblem {
    pub const fn new(
        strategy: &'static str,
        video: &'static str,
        oracle: OracleSource,
        note: &'static str,
    ) -> Self {
        Self {
            strategy,
            video,
            oracle,
            note,
        }
    }

    pub fn matches(&self, combination: &Combination) -> bool {
        self.strategy == combination.strategy
            && self.video == combination.video
            && self.oracle == combination.oracle
    }
}

use OracleSource::{Online, Precomputed};

const FEW_OFF: &str = "a few frames off";
const MANY_OFF: &str = "a lot of frames off";

/// OpenCV (FFmpeg videoio) seeks known to land on the wrong frame for the
/// OpenCV test videos.
pub const OPENCV_KNOWN_PROBLEMS: &[KnownProblem] = &[
    KnownProblem::new("opencv-always-seek", "VID00003-20100701-2204.3GP", Precomputed, FEW_OFF),
    KnownProblem::new("opencv-always-seek", "VID00003-20100701-2204.3GP", Online, FEW_OFF),
    KnownProblem::new("opencv-10orbigger-seek", "VID00003-20100701-2204.3GP", Precomputed, FEW_OFF),
    KnownProblem::new("opencv-10orbigger-seek", "VID00003-20100701-2204.3GP", Online, FEW_OFF),
    KnownProblem::new("opencv-always-seek", "VID00003-20100701-2204.avi", Precomputed, MANY_OFF),
    KnownProblem::new("opencv-always-seek", "VID00003-20100701-2204.avi", Online, MANY_OFF),
    KnownProblem::new("opencv-10orbigger-seek", "VID00003-20100701-2204.avi", Precomputed, MANY_OFF),
    KnownProblem::new("opencv-10orbigger-seek", "VID00003-20100701-2204.avi", Online, MANY_OFF),
    KnownProblem::new("opencv-always-seek", "VID00003-20100701-2204.mpg", Precomputed, FEW_OFF),
    KnownProblem::new("opencv-always-seek", "VID00003-20100701-2204.mpg", Online, FEW_OFF),
    KnownProblem::new("opencv-always-seek", "big_buck_bunny.mpg", Precomputed, FEW_OFF),
    KnownProblem::new("opencv-always-seek", "big_buck_bunny.mpg", Online, FEW_OFF),
    KnownProblem::new("opencv-10orbigger-seek", "big_buck_bunny.mpg", Precomputed, FEW_OFF),
    KnownProblem::new("opencv-10orbigger-seek", "big_buck_bunny.mpg", Online, FEW_OFF),
];

/// Immutable set of [`KnownProblem`]s.
#[derive(Debug, Clone, Copy)]
pub struct KnownProblemRegistry {
    entries: &'static [KnownProblem],
}

impl KnownProblemRegistry {
    pub const fn new(entries: &'static [KnownProblem]) -> Self {
        Self { entries }
    }

    pub const fn empty() -> Self {
        Self { entries: &[] }
    }

    pub fn is_known_problem(&self, combination: &Combination) -> bool {
        self.lookup(combination).is_some()
    }

    pub fn lookup(&self, combination: &Combination) -> Option<&'static KnownProblem> {
        self.entries.iter().find(|p| p.matches(combination))
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static KnownProblem> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for KnownProblemRegistry {
    fn default() -> Self {
        Self::new(OPENCV_KNOWN_PROBLEMS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_matches_full_triple() {
        let registry = KnownProblemRegistry::default();
        let known = Combination::new("opencv-always-seek", "big_buck_bunny.mpg", Online);
        assert!(registry.is_known_problem(&known));
        assert_eq!(registry.lookup(&known).unwrap().note, FEW_OFF);

        // never-seek is not listed for any video
        let never = Combination::new("opencv-never-seek", "big_buck_bunny.mpg", Online);
        assert!(!registry.is_known_problem(&never));

        // the mpg is only listed for always-seek
        let threshold = Combination::new(
            "opencv-10orbigger-seek",
            "VID00003-20100701-2204.mpg",
            Precomputed,
        );
        assert!(!registry.is_known_problem(&threshold));

        assert!(!KnownProblemRegistry::empty().is_known_problem(&known));
    }

    #[test]
    fn test_combination_label() {
        let combination = Combination::new(
            "opencv-10orbigger-seek",
            "VID00003-20100701-2204.3GP",
            Precomputed,
        );
        assert_eq!(
            combination.to_string(),
            "opencv-10orbigger-seek-VID00003-20100701-2204.3GP-expectations=precomputed"
        );
    }

    #[test]
    fn test_parse_oracle_source() {
        assert_eq!("online".parse::<OracleSource>().unwrap(), Online);
        assert!("cached".parse::<OracleSource>().is_err());
    }
}
