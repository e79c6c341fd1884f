//! Verify every (video, strategy, oracle source) combination of a run.
//!
//! Each video is handled on its own scoped thread. A thread owns its readers
//! and its online ground truth, so nothing mutable is shared between them.

use super::known_problems::{Combination, KnownProblemRegistry, OracleSource};
use super::report::{RunReport, VerificationReport};
use super::{SeekVerifier, VerifyConfig};
use crate::truth::cache::{cache_key, GroundTruthCache};
use crate::truth::{GroundTruth, GroundTruthComputer, Strictness};
use crate::video::{Backend, LengthSource, ReaderOptions, SeekStrategy, SeekingReader};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct MatrixPlan {
    pub videos: Vec<PathBuf>,
    pub strategies: Vec<SeekStrategy>,
    pub oracles: Vec<OracleSource>,
    pub double_check_seek: bool,
    pub length_source: LengthSource,
    pub config: VerifyConfig,
}

impl MatrixPlan {
    pub fn new(videos: Vec<PathBuf>) -> Self {
        Self {
            videos,
            strategies: vec![
                SeekStrategy::Never,
                SeekStrategy::Always,
                SeekStrategy::Threshold(10),
            ],
            oracles: OracleSource::ALL.to_vec(),
            double_check_seek: false,
            length_source: LengthSource::default(),
            config: VerifyConfig::default(),
        }
    }

    pub fn combinations(&self) -> usize {
        self.videos.len() * self.strategies.len() * self.oracles.len()
    }

    fn reader_options(&self, strategy: SeekStrategy) -> ReaderOptions {
        ReaderOptions::new(strategy)
            .double_check_seek(self.double_check_seek)
            .length_source(self.length_source)
    }
}

pub fn run_matrix<B: Backend>(
    backend: &B,
    plan: &MatrixPlan,
    cache: Option<&GroundTruthCache>,
    registry: &KnownProblemRegistry,
    on_result: &(dyn Fn(&VerificationReport) + Sync),
) -> RunReport {
    let scoped = crossbeam::scope(|s| {
        let handles: Vec<_> = plan
            .videos
            .iter()
            .map(|video| {
                let handle =
                    s.spawn(move |_| verify_video(backend, plan, video, cache, registry, on_result));
                (video, handle)
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|(video, handle)| {
                handle.join().unwrap_or_else(|_| {
                    tracing::error!("Verification thread for {:?} panicked", video);
                    setup_failures(backend, plan, video, registry, "verification thread panicked")
                })
            })
            .collect::<Vec<_>>()
    });

    let results = scoped.unwrap_or_else(|_| {
        tracing::error!("Verification scope panicked");
        Vec::new()
    });
    RunReport::new(backend.name(), results)
}

fn combination<B: Backend>(
    backend: &B,
    strategy: SeekStrategy,
    video: &str,
    oracle: OracleSource,
) -> Combination {
    Combination::new(format!("{}-{}", backend.name(), strategy.id()), video, oracle)
}

fn setup_failures<B: Backend>(
    backend: &B,
    plan: &MatrixPlan,
    video: &std::path::Path,
    registry: &KnownProblemRegistry,
    message: &str,
) -> Vec<VerificationReport> {
    let key = cache_key(video);
    plan.oracles
        .iter()
        .flat_map(|&oracle| {
            plan.strategies.iter().map(move |&strategy| (oracle, strategy))
        })
        .map(|(oracle, strategy)| {
            let combination = combination(backend, strategy, &key, oracle);
            let known = registry.is_known_problem(&combination);
            VerificationReport::setup_failure(combination, known, message.to_string())
        })
        .collect()
}

/// Expectations for one oracle source. An empty or missing oracle is
/// recomputed in strict mode, since nothing else can stand in for it.
fn expectations<B: Backend>(
    computer: &GroundTruthComputer<'_, B>,
    video: &std::path::Path,
    oracle: OracleSource,
    cache: Option<&GroundTruthCache>,
    online: &mut Option<GroundTruth>,
) -> Result<GroundTruth, String> {
    let truth = match oracle {
        OracleSource::Precomputed => {
            let cached = cache.and_then(|c| c.get_video(video)).cloned();
            if cached.is_none() {
                tracing::warn!("No precomputed expectations for {:?}", video);
            }
            cached.unwrap_or_default()
        }
        OracleSource::Online => match online {
            Some(truth) => truth.clone(),
            None => {
                let truth = computer.compute(video).map_err(|e| e.to_string())?;
                *online = Some(truth.clone());
                truth
            }
        },
    };

    if !truth.is_empty() {
        return Ok(truth);
    }
    let strict = computer
        .compute_with(Strictness::Strict, video)
        .map_err(|e| e.to_string())?;
    if strict.is_empty() {
        return Err(format!("{:?} has no decodable frames", video));
    }
    Ok(strict)
}

fn verify_video<B: Backend>(
    backend: &B,
    plan: &MatrixPlan,
    video: &std::path::Path,
    cache: Option<&GroundTruthCache>,
    registry: &KnownProblemRegistry,
    on_result: &(dyn Fn(&VerificationReport) + Sync),
) -> Vec<VerificationReport> {
    let key = cache_key(video);
    let computer = GroundTruthComputer::new(backend).length_source(plan.length_source);
    let verifier = SeekVerifier::new(plan.config, registry);
    let mut online = None;
    let mut reports = Vec::with_capacity(plan.strategies.len() * plan.oracles.len());

    for &oracle in &plan.oracles {
        let truth = expectations(&computer, video, oracle, cache, &mut online);

        for &strategy in &plan.strategies {
            let combination = combination(backend, strategy, &key, oracle);
            let report = match &truth {
                Err(message) => {
                    let known = registry.is_known_problem(&combination);
                    VerificationReport::setup_failure(combination, known, message.clone())
                }
                Ok(truth) => {
                    match SeekingReader::open(backend, video, plan.reader_options(strategy)) {
                        Ok(mut reader) => verifier.verify(&mut reader, truth, combination),
                        Err(e) => {
                            let known = registry.is_known_problem(&combination);
                            VerificationReport::setup_failure(combination, known, e.to_string())
                        }
                    }
                }
            };
            on_result(&report);
            reports.push(report);
        }
    }

    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::known_problems::KnownProblem;
    use crate::verify::report::Verdict;
    use crate::video::synthetic::{SyntheticBackend, SyntheticVideo};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ignore(_: &VerificationReport) {}

    fn plan(videos: &[&str]) -> MatrixPlan {
        let mut plan = MatrixPlan::new(videos.iter().map(PathBuf::from).collect());
        plan.length_source = LengthSource::Metadata;
        plan
    }

    #[test]
    fn test_matrix_covers_every_combination() {
        let backend = SyntheticBackend::new(SyntheticVideo::new(25));
        let plan = plan(&["/videos/a.avi", "/videos/b.mov"]);
        let computer = GroundTruthComputer::new(&backend).length_source(LengthSource::Metadata);
        let mut cache = GroundTruthCache::new(Path::new("unused.json"));
        for video in &plan.videos {
            cache.insert(cache_key(video), computer.compute(video).unwrap());
        }
        let seen = AtomicUsize::new(0);

        let run = run_matrix(
            &backend,
            &plan,
            Some(&cache),
            &KnownProblemRegistry::empty(),
            &|_: &VerificationReport| {
                seen.fetch_add(1, Ordering::Relaxed);
            },
        );

        assert_eq!(run.results.len(), plan.combinations());
        assert_eq!(seen.load(Ordering::Relaxed), 12);
        assert!(run.is_success(), "{:?}", run.errors());
        assert_eq!(run.counts().pass, 12);
        assert_eq!(backend.stats().live_handles(), 0);
    }

    #[test]
    fn test_missing_precomputed_falls_back_to_strict_computation() {
        let backend = SyntheticBackend::new(SyntheticVideo::new(12));
        let mut plan = plan(&["clip.avi"]);
        plan.oracles = vec![OracleSource::Precomputed];
        plan.strategies = vec![SeekStrategy::Always];

        let run = run_matrix(&backend, &plan, None, &KnownProblemRegistry::empty(), &ignore);
        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].verdict, Verdict::Pass);
    }

    #[test]
    fn test_strict_fallback_surfaces_lying_length() {
        // Metadata over-reports, so the strict recomputation fails.
        let backend = SyntheticBackend::new(SyntheticVideo::new(12).reporting_frames(14));
        let mut plan = plan(&["clip.avi"]);
        plan.oracles = vec![OracleSource::Precomputed];

        let run = run_matrix(&backend, &plan, None, &KnownProblemRegistry::empty(), &ignore);
        assert_eq!(run.results.len(), 3);
        assert!(run.results.iter().all(|r| r.verdict == Verdict::Error));
        assert!(run.results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("cannot read frame 12"));
    }

    #[test]
    fn test_known_problems_are_classified_per_combination() {
        static PROBLEMS: &[KnownProblem] = &[
            KnownProblem::new(
                "synthetic-always-seek",
                "clip.avi",
                OracleSource::Online,
                "off by one",
            ),
            KnownProblem::new(
                "synthetic-never-seek",
                "clip.avi",
                OracleSource::Online,
                "stale entry",
            ),
        ];
        let registry = KnownProblemRegistry::new(PROBLEMS);
        let backend = SyntheticBackend::new(SyntheticVideo::new(30).with_seek_offset(-1));
        let mut plan = plan(&["/videos/clip.avi"]);
        plan.oracles = vec![OracleSource::Online];

        let run = run_matrix(&backend, &plan, None, &registry, &ignore);
        let verdicts: Vec<(String, Verdict)> = run
            .results
            .iter()
            .map(|r| (r.combination.strategy.clone(), r.verdict))
            .collect();
        assert_eq!(
            verdicts,
            vec![
                ("synthetic-never-seek".to_string(), Verdict::UnexpectedPass),
                ("synthetic-always-seek".to_string(), Verdict::ExpectedFailure),
                ("synthetic-10orbigger-seek".to_string(), Verdict::Fail),
            ]
        );
        assert!(!run.is_success());
        assert_eq!(run.errors().len(), 2);
    }
}
