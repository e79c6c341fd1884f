use crate::error::VideoError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// When a reader is allowed to use the backend's native seek.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SeekStrategy {
    /// Always advance by sequential reads, reopening to go backwards.
    #[default]
    Never,
    /// Native seek whenever the target differs from the current position.
    Always,
    /// Native seek only for forward jumps of at least `k` frames.
    Threshold(usize),
}

impl SeekStrategy {
    /// Whether moving from `current` (next frame to be produced) to `target`
    /// goes through a native seek.
    pub fn should_seek(&self, current: usize, target: usize) -> bool {
        match *self {
            SeekStrategy::Never => false,
            SeekStrategy::Always => target != current,
            SeekStrategy::Threshold(k) => target >= current && target - current >= k,
        }
    }

    /// Identifier used in known-problem triples and reports, e.g. `always-seek`
    /// or `10orbigger-seek`.
    pub fn id(&self) -> String {
        match self {
            SeekStrategy::Never => "never-seek".to_string(),
            SeekStrategy::Always => "always-seek".to_string(),
            SeekStrategy::Threshold(k) => format!("{}orbigger-seek", k),
        }
    }
}

impl fmt::Display for SeekStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeekStrategy::Never => f.write_str("never"),
            SeekStrategy::Always => f.write_str("always"),
            SeekStrategy::Threshold(k) => write!(f, "{}", k),
        }
    }
}

impl FromStr for SeekStrategy {
    type Err = VideoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "never" => Ok(SeekStrategy::Never),
            "always" => Ok(SeekStrategy::Always),
            other => other
                .parse::<usize>()
                .map(SeekStrategy::Threshold)
                .map_err(|_| VideoError::InvalidStrategy(s.to_string())),
        }
    }
}

impl TryFrom<String> for SeekStrategy {
    type Error = VideoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SeekStrategy> for String {
    fn from(value: SeekStrategy) -> Self {
        value.to_string()
    }
}
