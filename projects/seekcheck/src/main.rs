mod cli;

use anyhow::{anyhow, Result};
use cli::{Args, BackendKind, Command, VideoArgs};
use indicatif::{ProgressBar, ProgressStyle};
use seekcheck::sources::resolve_videos;
use seekcheck::truth::cache::{cache_key, CachePolicy, GroundTruthCache};
use seekcheck::truth::{FrameSelection, GroundTruthComputer, Strictness};
use seekcheck::verify::known_problems::{KnownProblemRegistry, OracleSource};
use seekcheck::verify::matrix::{run_matrix, MatrixPlan};
use seekcheck::verify::report::VerificationReport;
use seekcheck::verify::VerifyConfig;
use seekcheck::video::build_info::BuildRequirement;
use seekcheck::video::synthetic::{SyntheticBackend, SyntheticVideo};
use seekcheck::video::Backend;
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let args = Args::parse_args();

    if let Command::BuildInfo { require } = &args.command {
        return build_info(require);
    }

    match args.backend {
        BackendKind::Synthetic => {
            let video = SyntheticVideo::new(args.synthetic_frames)
                .with_seek_offset(args.synthetic_seek_offset);
            run(&SyntheticBackend::new(video), &args.command)
        }
        #[cfg(feature = "opencv")]
        BackendKind::Opencv => run(&seekcheck::video::opencv_reader::OpencvBackend, &args.command),
        #[cfg(feature = "ffmpeg")]
        BackendKind::Ffmpeg => run(&seekcheck::video::ffmpeg_reader::FfmpegBackend, &args.command),
        #[allow(unreachable_patterns)]
        other => Err(anyhow!(
            "backend {:?} is not compiled in; rebuild with --features {}",
            other,
            format!("{:?}", other).to_lowercase()
        )),
    }
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn videos(args: &VideoArgs) -> Result<Vec<std::path::PathBuf>> {
    resolve_videos(&args.videos, args.video_root.as_deref())
}

fn run<B: Backend>(backend: &B, command: &Command) -> Result<ExitCode> {
    match command {
        Command::Compute {
            videos: video_args,
            strict,
            frames,
        } => {
            let videos = videos(video_args)?;
            let strictness = if *strict {
                Strictness::Strict
            } else {
                Strictness::Tolerant
            };
            let selection = frames.map(FrameSelection::First).unwrap_or_default();
            let computer = GroundTruthComputer::new(backend)
                .selection(selection)
                .strictness(strictness)
                .length_source(video_args.length_source.into());

            let mut cache = GroundTruthCache::load(&video_args.cache)?;
            let pb = progress_bar(videos.len())?;
            for video in &videos {
                pb.set_message(cache_key(video));
                let truth = computer.compute(video)?;
                pb.println(format!("{}: {} frames", cache_key(video), truth.len()));
                cache.insert(cache_key(video), truth);
                pb.inc(1);
            }
            pb.finish_with_message("Done");
            cache.save()?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Verify {
            videos: video_args,
            strategies,
            oracles,
            recompute,
            no_cache,
            double_check,
            rounds,
            samples,
            report,
            csv,
        } => {
            let videos = videos(video_args)?;
            let length_source = video_args.length_source.into();

            let cache = if oracles.contains(&OracleSource::Precomputed) {
                let computer = GroundTruthComputer::new(backend).length_source(length_source);
                let policy = CachePolicy {
                    use_cache: !no_cache,
                    recompute: *recompute,
                };
                Some(GroundTruthCache::resolve(
                    &video_args.cache,
                    &videos,
                    policy,
                    &computer,
                )?)
            } else {
                None
            };

            let plan = MatrixPlan {
                videos,
                strategies: strategies.clone(),
                oracles: oracles.clone(),
                double_check_seek: *double_check,
                length_source,
                config: VerifyConfig {
                    rounds: *rounds,
                    samples_per_round: *samples,
                },
            };

            let registry = KnownProblemRegistry::default();
            let pb = progress_bar(plan.combinations())?;
            let on_result = |result: &VerificationReport| {
                pb.println(format!("{:?} {}", result.verdict, result.combination));
                pb.inc(1);
            };
            let run_report = run_matrix(backend, &plan, cache.as_ref(), &registry, &on_result);
            pb.finish_with_message("Done");

            if let Some(path) = report {
                run_report.write_json(path)?;
            }
            if let Some(path) = csv {
                run_report.write_csv(path)?;
            }

            let counts = run_report.counts();
            tracing::info!(
                "{} passed, {} failed, {} expected failures, {} unexpected passes, {} errors",
                counts.pass,
                counts.fail,
                counts.expected_failure,
                counts.unexpected_pass,
                counts.error
            );
            let errors = run_report.errors();
            for error in &errors {
                eprintln!("{}", error);
            }
            Ok(if errors.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::BuildInfo { require } => build_info(require),
    }
}

#[cfg(feature = "opencv")]
fn build_info(require: &[BuildRequirement]) -> Result<ExitCode> {
    use seekcheck::video::build_info::{
        opencv_build_information, parse_build_information, unmet_requirements,
    };

    let text = opencv_build_information()?;
    let infos = parse_build_information(&text);
    for (key, value) in &infos {
        println!("{} = {}", key, value);
    }
    let unmet = unmet_requirements(&infos, require);
    for (req, found) in &unmet {
        eprintln!(
            "missing build feature: {} should contain {:?}, found {:?}",
            req.key, req.contains, found
        );
    }
    Ok(if unmet.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(not(feature = "opencv"))]
fn build_info(_require: &[BuildRequirement]) -> Result<ExitCode> {
    Err(anyhow!(
        "build-info needs OpenCV; rebuild with --features opencv"
    ))
}
