use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use seekcheck::verify::known_problems::OracleSource;
use seekcheck::video::build_info::BuildRequirement;
use seekcheck::video::{LengthSource, SeekStrategy};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Decode backend under test; defaults to the first one compiled in
    #[arg(long, value_enum, default_value_t = BackendKind::DEFAULT, env = "SEEKCHECK_BACKEND")]
    pub backend: BackendKind,

    /// Frame count of every video when using the synthetic backend
    #[arg(long, default_value_t = 100)]
    pub synthetic_frames: usize,

    /// Offset applied to native seeks by the synthetic backend
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub synthetic_seek_offset: isize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Opencv,
    Ffmpeg,
    Synthetic,
}

impl BackendKind {
    #[cfg(feature = "opencv")]
    pub const DEFAULT: BackendKind = BackendKind::Opencv;
    #[cfg(all(feature = "ffmpeg", not(feature = "opencv")))]
    pub const DEFAULT: BackendKind = BackendKind::Ffmpeg;
    #[cfg(not(any(feature = "opencv", feature = "ffmpeg")))]
    pub const DEFAULT: BackendKind = BackendKind::Synthetic;
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthArg {
    /// Count frames with ffprobe, falling back to container metadata
    Ffprobe,
    /// Trust container metadata
    Metadata,
}

impl From<LengthArg> for LengthSource {
    fn from(value: LengthArg) -> Self {
        match value {
            LengthArg::Ffprobe => LengthSource::Ffprobe,
            LengthArg::Metadata => LengthSource::Metadata,
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct VideoArgs {
    /// Video files
    pub videos: Vec<PathBuf>,

    /// Also verify every video found under this directory
    #[arg(long, env = "SEEKCHECK_VIDEO_ROOT")]
    pub video_root: Option<PathBuf>,

    /// Ground truth cache file
    #[arg(long, env = "SEEKCHECK_CACHE", default_value = "frame_hashes.json")]
    pub cache: PathBuf,

    /// How the frame count of a video is determined
    #[arg(long, value_enum, default_value_t = LengthArg::Ffprobe)]
    pub length_source: LengthArg,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute ground truth for videos and store it in the cache
    Compute {
        #[command(flatten)]
        videos: VideoArgs,

        /// Fail instead of truncating when a frame cannot be decoded
        #[arg(long)]
        strict: bool,

        /// Only cover the first N frames
        #[arg(long)]
        frames: Option<usize>,
    },

    /// Verify seeking for every video, strategy and expectation source
    Verify {
        #[command(flatten)]
        videos: VideoArgs,

        /// Seek strategies: never, always, or a minimum forward jump
        #[arg(
            long = "strategy",
            value_delimiter = ',',
            default_values_t = [SeekStrategy::Never, SeekStrategy::Always, SeekStrategy::Threshold(10)]
        )]
        strategies: Vec<SeekStrategy>,

        /// Expectation sources
        #[arg(
            long = "expectations",
            value_delimiter = ',',
            default_values_t = OracleSource::ALL
        )]
        oracles: Vec<OracleSource>,

        /// Recompute precomputed expectations even if the cache exists
        #[arg(long)]
        recompute: bool,

        /// Neither read nor write the cache file
        #[arg(long)]
        no_cache: bool,

        /// Fail a seek when the backend reports a different position
        #[arg(long)]
        double_check: bool,

        #[arg(long, default_value_t = 10)]
        rounds: usize,

        #[arg(long, default_value_t = 20)]
        samples: usize,

        /// Write the full report as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Write one CSV row per sampled frame
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Print OpenCV build information and check required build features
    BuildInfo {
        /// KEY=SUBSTRING, e.g. "Parallel framework=TBB"
        #[arg(long)]
        require: Vec<BuildRequirement>,
    },
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_is_compiled_in() {
        let args = Args::try_parse_from(["seekcheck", "verify", "clip.avi"]).unwrap();
        assert_eq!(args.backend, BackendKind::DEFAULT);
        #[cfg(not(any(feature = "opencv", feature = "ffmpeg")))]
        assert_eq!(args.backend, BackendKind::Synthetic);
        #[cfg(feature = "opencv")]
        assert_eq!(args.backend, BackendKind::Opencv);
    }

    #[test]
    fn test_verify_defaults() {
        let args = Args::try_parse_from(["seekcheck", "--backend", "synthetic", "verify", "a.avi"])
            .unwrap();
        match args.command {
            Command::Verify {
                videos, strategies, ..
            } => {
                assert_eq!(videos.videos, vec![PathBuf::from("a.avi")]);
                assert_eq!(
                    strategies,
                    vec![
                        SeekStrategy::Never,
                        SeekStrategy::Always,
                        SeekStrategy::Threshold(10)
                    ]
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
