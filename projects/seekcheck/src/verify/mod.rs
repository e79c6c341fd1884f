//! Seek verification: sample frames, fetch them through a seeking reader and
//! compare their digests against the ground truth.

pub mod known_problems;
pub mod matrix;
pub mod report;

use crate::error::VideoError;
use crate::hashing::FrameDigest;
use crate::truth::GroundTruth;
use crate::video::VideoReader;
use known_problems::{Combination, KnownProblemRegistry};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use report::{SampleOutcome, SampleRecord, VerificationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyConfig {
    /// Rounds of sampling; round `r` shuffles with seed `r`.
    pub rounds: usize,
    pub samples_per_round: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        // Sometimes it takes a bit to uncover errors; raise these to be stricter.
        Self {
            rounds: 10,
            samples_per_round: 20,
        }
    }
}

/// Frames to request in `round`. Deterministic for a given ground truth.
/// Round 0 also requests the first and last frame.
pub fn sample_round(
    truth: &GroundTruth,
    round: usize,
    samples_per_round: usize,
) -> Vec<(usize, FrameDigest)> {
    let mut pairs: Vec<(usize, FrameDigest)> = truth.iter().collect();
    let mut rng = StdRng::seed_from_u64(round as u64);
    pairs.shuffle(&mut rng);
    pairs.truncate(samples_per_round);

    if round == 0 {
        if let (Some(first), Some(last)) = (truth.first(), truth.last()) {
            pairs.push(first);
            pairs.push(last);
        }
    }
    pairs
}

pub struct SeekVerifier<'r> {
    config: VerifyConfig,
    registry: &'r KnownProblemRegistry,
}

impl<'r> SeekVerifier<'r> {
    pub fn new(config: VerifyConfig, registry: &'r KnownProblemRegistry) -> Self {
        Self { config, registry }
    }

    /// Verify `reader` (already configured with the strategy under test)
    /// against `truth`. Every sample is recorded; nothing stops the run early.
    /// An empty `truth` cannot cover the first and last frame and is reported
    /// as [`Verdict::Error`](report::Verdict::Error).
    pub fn verify<R: VideoReader>(
        &self,
        reader: &mut R,
        truth: &GroundTruth,
        combination: Combination,
    ) -> VerificationReport {
        let known_problem = self.registry.is_known_problem(&combination);
        if truth.is_empty() {
            tracing::error!("SeekVerifier: no expectations for {}", combination);
            return VerificationReport::setup_failure(
                combination,
                known_problem,
                "ground truth has no frames".to_string(),
            );
        }
        let index = truth.reverse_index();
        let mut samples = Vec::new();

        for round in 0..self.config.rounds {
            for (frame_number, expected) in sample_round(truth, round, self.config.samples_per_round)
            {
                let (observed, outcome) = match reader.frame(frame_number) {
                    Ok(frame) => {
                        let observed = frame.digest();
                        let outcome = if observed == expected {
                            SampleOutcome::Match
                        } else {
                            match index.locate(&observed, frame_number) {
                                Some(actual) => SampleOutcome::OffBy { actual },
                                None => SampleOutcome::UnrecognizedContent,
                            }
                        };
                        (Some(observed), outcome)
                    }
                    Err(VideoError::SeekInconsistency { reported, .. }) => {
                        (None, SampleOutcome::SeekInconsistency { reported })
                    }
                    Err(e @ VideoError::Decode { .. }) => (
                        None,
                        SampleOutcome::DecodeFailure {
                            message: e.to_string(),
                        },
                    ),
                    Err(e) => (
                        None,
                        SampleOutcome::ReaderFault {
                            message: e.to_string(),
                        },
                    ),
                };

                let record = SampleRecord {
                    round,
                    frame: frame_number,
                    expected,
                    observed,
                    outcome,
                };
                if record.outcome.is_failure() {
                    if known_problem && !record.outcome.is_hard_failure() {
                        tracing::debug!(
                            "Known seeking error for {}: {}",
                            combination,
                            record.describe()
                        );
                    } else {
                        tracing::warn!("{}: {}", combination, record.describe());
                    }
                }
                samples.push(record);
            }
        }

        let report = VerificationReport::from_samples(combination, known_problem, samples);
        tracing::info!(
            "SeekVerifier: {} -> {:?} ({} failures in {} samples)",
            report.combination,
            report.verdict,
            report.failures().count(),
            report.samples.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::truth::GroundTruthComputer;
    use crate::verify::known_problems::{KnownProblem, OracleSource};
    use crate::verify::report::{VerificationError, Verdict};
    use crate::video::synthetic::{SyntheticBackend, SyntheticVideo};
    use crate::video::{LengthSource, ReaderOptions, SeekStrategy, SeekingReader};
    use std::path::Path;

    fn truth_for(backend: &SyntheticBackend) -> GroundTruth {
        GroundTruthComputer::new(backend)
            .length_source(LengthSource::Metadata)
            .compute(Path::new("clip.avi"))
            .unwrap()
    }

    fn reader(
        backend: &SyntheticBackend,
        strategy: SeekStrategy,
        double_check: bool,
    ) -> SeekingReader<'_, SyntheticBackend> {
        let options = ReaderOptions::new(strategy)
            .double_check_seek(double_check)
            .length_source(LengthSource::Metadata);
        SeekingReader::open(backend, Path::new("clip.avi"), options).unwrap()
    }

    fn combination(strategy: SeekStrategy) -> Combination {
        Combination::new(
            format!("synthetic-{}", strategy.id()),
            "clip.avi",
            OracleSource::Online,
        )
    }

    #[test]
    fn test_first_round_covers_boundaries() {
        let backend = SyntheticBackend::new(SyntheticVideo::new(100));
        let truth = truth_for(&backend);
        let round0 = sample_round(&truth, 0, 20);
        assert_eq!(round0.len(), 22);
        assert!(round0.iter().any(|(n, _)| *n == 0));
        assert!(round0.iter().any(|(n, _)| *n == 99));

        let round1 = sample_round(&truth, 1, 20);
        assert_eq!(round1.len(), 20);
        assert_eq!(round1, sample_round(&truth, 1, 20));
        assert_ne!(round0[..20], round1[..]);
    }

    #[test]
    fn test_short_video_samples_every_frame() {
        let backend = SyntheticBackend::new(SyntheticVideo::new(13));
        let truth = truth_for(&backend);
        let mut round = sample_round(&truth, 3, 20);
        round.sort();
        assert_eq!(round, truth.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_precise_backend_passes_for_every_strategy() {
        let registry = KnownProblemRegistry::empty();
        let verifier = SeekVerifier::new(VerifyConfig::default(), &registry);
        for strategy in [
            SeekStrategy::Never,
            SeekStrategy::Always,
            SeekStrategy::Threshold(10),
        ] {
            let backend = SyntheticBackend::new(SyntheticVideo::new(13));
            let truth = truth_for(&backend);
            let mut reader = reader(&backend, strategy, true);
            let report = verifier.verify(&mut reader, &truth, combination(strategy));
            assert_eq!(report.verdict, Verdict::Pass, "{:?}", strategy);
            assert_eq!(report.samples.len(), 10 * 13 + 2);
        }
    }

    #[test]
    fn test_imprecise_seek_is_classified_as_off_by() {
        let backend = SyntheticBackend::new(SyntheticVideo::new(13).with_seek_offset(-1));
        let truth = truth_for(&backend);
        let registry = KnownProblemRegistry::empty();
        let verifier = SeekVerifier::new(
            VerifyConfig {
                rounds: 1,
                samples_per_round: 0,
            },
            &registry,
        );
        // Round 0 with no random samples requests frame 0, then frame 12.
        let mut reader = reader(&backend, SeekStrategy::Always, false);
        let report = verifier.verify(&mut reader, &truth, combination(SeekStrategy::Always));

        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(report.samples.len(), 2);
        assert_eq!(report.samples[0].outcome, SampleOutcome::Match);
        assert_eq!(report.samples[1].frame, 12);
        assert_eq!(
            report.samples[1].outcome,
            SampleOutcome::OffBy { actual: 11 }
        );
        match report.check() {
            Err(VerificationError::Regression { message, .. }) => {
                assert_eq!(message, "wrong seek for frame 12 (went to 11)")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_corrupted_content_is_unrecognized() {
        let backend = SyntheticBackend::new(SyntheticVideo::new(30).with_corrupt_after_seek());
        let truth = truth_for(&backend);
        let registry = KnownProblemRegistry::empty();
        let verifier = SeekVerifier::new(VerifyConfig::default(), &registry);
        let mut reader = reader(&backend, SeekStrategy::Always, true);
        let report = verifier.verify(&mut reader, &truth, combination(SeekStrategy::Always));

        assert_eq!(report.verdict, Verdict::Fail);
        let failure = report.first_failure().unwrap();
        assert_eq!(failure.outcome, SampleOutcome::UnrecognizedContent);
        assert!(failure.observed.is_some());
        assert!(report
            .failures()
            .all(|s| s.outcome == SampleOutcome::UnrecognizedContent));
    }

    #[test]
    fn test_seek_inconsistency_is_recorded_and_can_be_acknowledged() {
        static PROBLEMS: &[KnownProblem] = &[KnownProblem::new(
            "synthetic-always-seek",
            "clip.avi",
            OracleSource::Online,
            "lands two frames early",
        )];
        let registry = KnownProblemRegistry::new(PROBLEMS);
        let backend = SyntheticBackend::new(
            SyntheticVideo::new(30)
                .with_seek_offset(-2)
                .with_honest_position(),
        );
        let truth = truth_for(&backend);
        let verifier = SeekVerifier::new(VerifyConfig::default(), &registry);
        let mut reader = reader(&backend, SeekStrategy::Always, true);
        let report = verifier.verify(&mut reader, &truth, combination(SeekStrategy::Always));

        assert!(report
            .failures()
            .any(|s| matches!(s.outcome, SampleOutcome::SeekInconsistency { .. })));
        assert_eq!(report.verdict, Verdict::ExpectedFailure);
        assert!(report.check().is_ok());
    }

    #[test]
    fn test_fixed_known_problem_reports_staleness() {
        static PROBLEMS: &[KnownProblem] = &[KnownProblem::new(
            "synthetic-always-seek",
            "clip.avi",
            OracleSource::Online,
            "used to be off by one",
        )];
        let registry = KnownProblemRegistry::new(PROBLEMS);
        let backend = SyntheticBackend::new(SyntheticVideo::new(40));
        let truth = truth_for(&backend);
        let verifier = SeekVerifier::new(VerifyConfig::default(), &registry);
        let mut reader = reader(&backend, SeekStrategy::Always, true);
        let report = verifier.verify(&mut reader, &truth, combination(SeekStrategy::Always));

        assert_eq!(report.samples.len(), 10 * 20 + 2);
        assert_eq!(report.failures().count(), 0);
        assert_eq!(report.verdict, Verdict::UnexpectedPass);
        assert!(matches!(
            report.check(),
            Err(VerificationError::RegistryStaleness { .. })
        ));
    }

    #[test]
    fn test_decode_failure_interrupting_seek_fails() {
        // Ground truth is built from a longer rendition of the same content,
        // so the last frames exist in the oracle but not in the reader.
        let full = SyntheticBackend::new(SyntheticVideo::new(20));
        let truth = truth_for(&full);
        let short = SyntheticBackend::new(SyntheticVideo::new(15));
        let registry = KnownProblemRegistry::empty();
        let verifier = SeekVerifier::new(VerifyConfig::default(), &registry);
        let mut reader = reader(&short, SeekStrategy::Never, false);
        let report = verifier.verify(&mut reader, &truth, combination(SeekStrategy::Never));

        assert_eq!(report.verdict, Verdict::Fail);
        assert!(report
            .failures()
            .all(|s| s.frame >= 15 && matches!(s.outcome, SampleOutcome::DecodeFailure { .. })));
    }

    #[test]
    fn test_decode_failure_is_not_excused_by_known_problem() {
        static PROBLEMS: &[KnownProblem] = &[KnownProblem::new(
            "synthetic-never-seek",
            "clip.avi",
            OracleSource::Online,
            "frames off by one",
        )];
        let registry = KnownProblemRegistry::new(PROBLEMS);
        let full = SyntheticBackend::new(SyntheticVideo::new(20));
        let truth = truth_for(&full);
        let short = SyntheticBackend::new(SyntheticVideo::new(15));
        let verifier = SeekVerifier::new(VerifyConfig::default(), &registry);
        let mut reader = reader(&short, SeekStrategy::Never, false);
        let report = verifier.verify(&mut reader, &truth, combination(SeekStrategy::Never));

        assert!(report.known_problem);
        assert_eq!(report.verdict, Verdict::Fail);
        assert!(report
            .failures()
            .any(|s| matches!(s.outcome, SampleOutcome::DecodeFailure { .. })));
        assert!(matches!(
            report.check(),
            Err(VerificationError::Regression { .. })
        ));
    }

    #[test]
    fn test_empty_truth_is_a_setup_error() {
        let backend = SyntheticBackend::new(SyntheticVideo::new(13));
        let registry = KnownProblemRegistry::empty();
        let verifier = SeekVerifier::new(VerifyConfig::default(), &registry);
        let mut reader = reader(&backend, SeekStrategy::Always, true);
        let report = verifier.verify(
            &mut reader,
            &GroundTruth::default(),
            combination(SeekStrategy::Always),
        );

        assert_eq!(report.verdict, Verdict::Error);
        assert!(report.samples.is_empty());
        assert!(matches!(
            report.check(),
            Err(VerificationError::Setup { .. })
        ));
        assert_eq!(backend.stats().reads(), 0);
    }
}
