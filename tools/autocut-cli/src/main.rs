//! AutoCut CLI: cut recordings along their subtitles.
//!
//! Usage:
//!   autocut cut <INPUT> <SUBTITLES>   Remove rejected cues from audio/video
//!   autocut preview <SUBTITLES>       Show the retimed cues without touching media
//!   autocut check                     Check encoder and host readiness

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use autocut_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "autocut",
    about = "Subtractive audio/video cutting driven by subtitles",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: $XDG_CONFIG_HOME/autocut/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Which cues to keep.
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Rejection list: one phrase per line
    #[arg(short, long)]
    filter: Option<PathBuf>,

    /// Also reject the built-in filler phrases
    #[arg(long)]
    default_fillers: bool,

    /// First cue to consider (1-based, inclusive)
    #[arg(long)]
    start: Option<usize>,

    /// Last cue to consider (1-based, inclusive)
    #[arg(long)]
    end: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Cut an audio or video file along its subtitles
    Cut {
        /// Audio or video file
        input: PathBuf,

        /// SRT subtitles for the input
        subtitles: PathBuf,

        /// Output file (default: <input>_cut.<format>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Retimed subtitle file (default: output with .srt)
        #[arg(long)]
        subtitle_output: Option<PathBuf>,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Output format: mp3|m4a|wav|flac|ogg|mp4 (default: from output name, else mp3)
        #[arg(long)]
        format: Option<String>,

        /// Encoding quality: high|medium|low
        #[arg(long, default_value = "high")]
        quality: String,

        /// Cues per extraction batch (clamped to 100..=1000)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Extract audio from merged segments, keeping short pauses
        #[arg(long)]
        merge_audio: bool,

        /// Write a JSON segment map next to the subtitles
        #[arg(long)]
        segment_map: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which cues survive and their new timings
    Preview {
        /// SRT subtitles
        subtitles: PathBuf,

        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Check encoder availability and system resources
    Check {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display())),
        None => Ok(AppConfig::load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;
    autocut_common::logging::init_logging(&autocut_common::logging::cli_logging(
        &config.logging,
        cli.verbose,
    ));

    match cli.command {
        Commands::Cut {
            input,
            subtitles,
            output,
            subtitle_output,
            selection,
            format,
            quality,
            batch_size,
            merge_audio,
            segment_map,
            json,
        } => {
            commands::cut::run(
                config,
                commands::cut::CutArgs {
                    input,
                    subtitles,
                    output,
                    subtitle_output,
                    selection,
                    format,
                    quality,
                    batch_size,
                    merge_audio,
                    segment_map,
                    json,
                },
            )
            .await
        }
        Commands::Preview {
            subtitles,
            selection,
        } => commands::preview::run(subtitles, selection),
        Commands::Check { json } => commands::check::run(config, json).await,
    }
}
