use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "dubalign",
    about = "Fit translated text-to-speech into each subtitle's time budget",
    version,
    after_help = "\x1b[1mExamples:\x1b[0m
  dubalign init ./my-dub                          Write a default dubalign.toml
  dubalign policy 1.6                             Show the speed schedule for a ceiling
  dubalign measure ./clip.mp3                     Trimmed duration of an audio file
  dubalign align --text \"你好世界\" --target 1.0    Align one line
  dubalign batch segments.json -o report.json     Align a batch of segments
  dubalign batch --srt en.srt --translated zh.srt Align subtitle cues"
)]
pub struct Cli {
    /// Project directory containing dubalign.toml (and optionally .env)
    #[arg(long, short = 'p', global = true, default_value = ".")]
    pub project: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default dubalign.toml
    Init {
        /// Directory to initialize (default: the project directory)
        path: Option<PathBuf>,
    },
    /// Print the speed schedule derived from a speed ceiling
    Policy {
        /// Speed ceiling, 1.2 to 2.0
        max_speed: f64,
    },
    /// Print the silence-trimmed duration of an audio file or URL
    Measure {
        /// Local mp3/wav path or http(s) URL
        handle: String,

        /// Silence threshold in dBFS (overrides dubalign.toml)
        #[arg(long, allow_hyphen_values = true)]
        threshold_db: Option<f64>,
    },
    /// Align a single line and print the result as JSON
    Align {
        /// Translated text to synthesize
        #[arg(long)]
        text: String,

        /// Time budget in seconds
        #[arg(long)]
        target: f64,

        /// Source-language text; enables the shortening step
        #[arg(long)]
        original: Option<String>,

        /// Voice ID (default: [synthesis] default_voice)
        #[arg(long)]
        voice: Option<String>,

        /// Emotion, or "auto" to leave it to the backend
        #[arg(long)]
        emotion: Option<String>,

        /// Speed ceiling (default: [alignment] max_speed)
        #[arg(long)]
        max_speed: Option<f64>,
    },
    /// Align many segments from a JSON file or a pair of SRT files
    Batch {
        /// JSON array of segments
        #[arg(required_unless_present = "srt", conflicts_with = "srt")]
        segments: Option<PathBuf>,

        /// Original-language SRT; cue timings set the budgets
        #[arg(long, requires = "translated")]
        srt: Option<PathBuf>,

        /// Translated SRT with the same cue indices
        #[arg(long, requires = "srt")]
        translated: Option<PathBuf>,

        /// Maximum number of segments aligned concurrently
        #[arg(long, default_value_t = 1)]
        parallel: usize,

        /// Write the JSON report here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Also write the dubbed track (WAV) with each aligned segment at its start time
        #[arg(long)]
        track: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_align() {
        let cli = Cli::parse_from([
            "dubalign", "align", "--text", "你好", "--target", "1.5", "--max-speed", "1.6",
        ]);
        match cli.command {
            Command::Align {
                text,
                target,
                max_speed,
                original,
                ..
            } => {
                assert_eq!(text, "你好");
                assert_eq!(target, 1.5);
                assert_eq!(max_speed, Some(1.6));
                assert!(original.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.project, PathBuf::from("."));
    }

    #[test]
    fn test_parse_batch_from_srt_pair() {
        let cli = Cli::parse_from([
            "dubalign", "-p", "dub", "batch", "--srt", "en.srt", "--translated", "zh.srt",
            "--parallel", "2",
        ]);
        assert_eq!(cli.project, PathBuf::from("dub"));
        match cli.command {
            Command::Batch {
                segments,
                srt,
                parallel,
                ..
            } => {
                assert!(segments.is_none());
                assert_eq!(srt, Some(PathBuf::from("en.srt")));
                assert_eq!(parallel, 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_batch_with_track() {
        let cli = Cli::parse_from(["dubalign", "batch", "segments.json", "--track", "dub.wav"]);
        match cli.command {
            Command::Batch {
                segments, track, ..
            } => {
                assert_eq!(segments, Some(PathBuf::from("segments.json")));
                assert_eq!(track, Some(PathBuf::from("dub.wav")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_batch_requires_an_input() {
        assert!(Cli::try_parse_from(["dubalign", "batch"]).is_err());
        assert!(Cli::try_parse_from(["dubalign", "batch", "--srt", "en.srt"]).is_err());
    }

    #[test]
    fn test_measure_accepts_negative_threshold() {
        let cli = Cli::parse_from(["dubalign", "measure", "a.wav", "--threshold-db", "-40"]);
        assert!(matches!(
            cli.command,
            Command::Measure { threshold_db: Some(t), .. } if t == -40.0
        ));
    }
}
