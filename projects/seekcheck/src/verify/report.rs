use super::known_problems::Combination;
use crate::hashing::FrameDigest;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Result of fetching one sampled frame through a seeking reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SampleOutcome {
    Match,
    /// Content belongs to another frame of the same video.
    OffBy { actual: usize },
    /// Content matches no frame of the ground truth.
    UnrecognizedContent,
    /// The backend reported a position other than the one requested.
    SeekInconsistency { reported: usize },
    DecodeFailure { message: String },
    ReaderFault { message: String },
}

impl SampleOutcome {
    pub fn is_failure(&self) -> bool {
        !matches!(self, SampleOutcome::Match)
    }

    /// Failures the known-problem registry cannot acknowledge: the reader
    /// broke instead of returning the wrong frame.
    pub fn is_hard_failure(&self) -> bool {
        matches!(
            self,
            SampleOutcome::DecodeFailure { .. } | SampleOutcome::ReaderFault { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SampleOutcome::Match => "match",
            SampleOutcome::OffBy { .. } => "off_by",
            SampleOutcome::UnrecognizedContent => "unrecognized_content",
            SampleOutcome::SeekInconsistency { .. } => "seek_inconsistency",
            SampleOutcome::DecodeFailure { .. } => "decode_failure",
            SampleOutcome::ReaderFault { .. } => "reader_fault",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub round: usize,
    pub frame: usize,
    pub expected: FrameDigest,
    /// Digest of what the reader returned, if it returned anything.
    pub observed: Option<FrameDigest>,
    pub outcome: SampleOutcome,
}

impl SampleRecord {
    pub fn describe(&self) -> String {
        match &self.outcome {
            SampleOutcome::Match => format!("frame {} matches", self.frame),
            SampleOutcome::OffBy { actual } => {
                format!("wrong seek for frame {} (went to {})", self.frame, actual)
            }
            SampleOutcome::UnrecognizedContent => format!(
                "image for frame {} generates an unknown hash ({})",
                self.frame,
                self.observed
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "none".to_string())
            ),
            SampleOutcome::SeekInconsistency { reported } => format!(
                "seek to frame {} left the backend at frame {}",
                self.frame, reported
            ),
            SampleOutcome::DecodeFailure { message } | SampleOutcome::ReaderFault { message } => {
                format!("frame {}: {}", self.frame, message)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    /// Failed, and listed as a known problem.
    ExpectedFailure,
    /// Listed as a known problem but nothing failed.
    UnexpectedPass,
    /// Verification could not run (reader or expectations unavailable).
    Error,
}

impl Verdict {
    pub fn decide(any_failure: bool, any_hard_failure: bool, known_problem: bool) -> Self {
        if any_hard_failure {
            return Verdict::Fail;
        }
        match (any_failure, known_problem) {
            (false, false) => Verdict::Pass,
            (true, false) => Verdict::Fail,
            (true, true) => Verdict::ExpectedFailure,
            (false, true) => Verdict::UnexpectedPass,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Pass | Verdict::ExpectedFailure)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("{message} ({combination}; {failures} of {samples} sampled frames failed)")]
    Regression {
        combination: String,
        message: String,
        failures: usize,
        samples: usize,
    },
    #[error("problem for {combination} seems fixed, remove it from the known problems")]
    RegistryStaleness { combination: String },
    #[error("could not verify {combination}: {message}")]
    Setup { combination: String, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub combination: Combination,
    pub known_problem: bool,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub samples: Vec<SampleRecord>,
}

impl VerificationReport {
    pub fn from_samples(
        combination: Combination,
        known_problem: bool,
        samples: Vec<SampleRecord>,
    ) -> Self {
        let any_failure = samples.iter().any(|s| s.outcome.is_failure());
        let any_hard_failure = samples.iter().any(|s| s.outcome.is_hard_failure());
        Self {
            combination,
            known_problem,
            verdict: Verdict::decide(any_failure, any_hard_failure, known_problem),
            error: None,
            samples,
        }
    }

    pub fn setup_failure(combination: Combination, known_problem: bool, message: String) -> Self {
        Self {
            combination,
            known_problem,
            verdict: Verdict::Error,
            error: Some(message),
            samples: Vec::new(),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &SampleRecord> {
        self.samples.iter().filter(|s| s.outcome.is_failure())
    }

    pub fn first_failure(&self) -> Option<&SampleRecord> {
        self.failures().next()
    }

    /// `Ok` for passes and acknowledged failures.
    pub fn check(&self) -> Result<(), VerificationError> {
        let combination = self.combination.to_string();
        match self.verdict {
            Verdict::Pass | Verdict::ExpectedFailure => Ok(()),
            Verdict::Fail => Err(VerificationError::Regression {
                message: self
                    .samples
                    .iter()
                    .find(|s| s.outcome.is_hard_failure())
                    .or_else(|| self.first_failure())
                    .map(SampleRecord::describe)
                    .unwrap_or_default(),
                failures: self.failures().count(),
                samples: self.samples.len(),
                combination,
            }),
            Verdict::UnexpectedPass => Err(VerificationError::RegistryStaleness { combination }),
            Verdict::Error => Err(VerificationError::Setup {
                combination,
                message: self.error.clone().unwrap_or_default(),
            }),
        }
    }
}

/// All combinations verified in one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub backend: String,
    pub results: Vec<VerificationReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerdictCounts {
    pub pass: usize,
    pub fail: usize,
    pub expected_failure: usize,
    pub unexpected_pass: usize,
    pub error: usize,
}

#[derive(Serialize)]
struct SampleRow<'a> {
    combination: String,
    round: usize,
    frame: usize,
    outcome: &'static str,
    actual: Option<usize>,
    expected: String,
    observed: Option<String>,
    detail: &'a str,
}

impl RunReport {
    pub fn new(backend: &str, results: Vec<VerificationReport>) -> Self {
        Self {
            generated_at: Utc::now(),
            backend: backend.to_string(),
            results,
        }
    }

    pub fn counts(&self) -> VerdictCounts {
        let mut counts = VerdictCounts::default();
        for result in &self.results {
            match result.verdict {
                Verdict::Pass => counts.pass += 1,
                Verdict::Fail => counts.fail += 1,
                Verdict::ExpectedFailure => counts.expected_failure += 1,
                Verdict::UnexpectedPass => counts.unexpected_pass += 1,
                Verdict::Error => counts.error += 1,
            }
        }
        counts
    }

    pub fn errors(&self) -> Vec<VerificationError> {
        self.results
            .iter()
            .filter_map(|r| r.check().err())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.verdict.is_success())
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write report {:?}", path))?;
        Ok(())
    }

    /// One row per sampled frame.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create CSV report {:?}", path))?;
        for result in &self.results {
            let combination = result.combination.to_string();
            for sample in &result.samples {
                let detail = match &sample.outcome {
                    SampleOutcome::DecodeFailure { message }
                    | SampleOutcome::ReaderFault { message } => message.as_str(),
                    _ => "",
                };
                writer.serialize(SampleRow {
                    combination: combination.clone(),
                    round: sample.round,
                    frame: sample.frame,
                    outcome: sample.outcome.kind(),
                    actual: match sample.outcome {
                        SampleOutcome::OffBy { actual } => Some(actual),
                        SampleOutcome::SeekInconsistency { reported } => Some(reported),
                        _ => None,
                    },
                    expected: sample.expected.to_string(),
                    observed: sample.observed.map(|d| d.to_string()),
                    detail,
                })?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}
