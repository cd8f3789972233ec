//! Cut a recording along its subtitles.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;

use autocut_common::config::{AppConfig, CutDefaults};
use autocut_common::error::AutocutError;
use autocut_common::memory::SystemMemory;
use autocut_processing::ExtractionMode;
use autocut_render::{
    run_cut, CutContext, CutJob, CutProgress, EncoderRunner, OutputFormat, Quality,
};
use autocut_timeline::Timeline;

use crate::SelectionArgs;

pub struct CutArgs {
    pub input: PathBuf,
    pub subtitles: PathBuf,
    pub output: Option<PathBuf>,
    pub subtitle_output: Option<PathBuf>,
    pub selection: SelectionArgs,
    pub format: Option<String>,
    pub quality: String,
    pub batch_size: Option<usize>,
    pub merge_audio: bool,
    pub segment_map: bool,
    pub json: bool,
}

/// `<dir>/<stem>_cut.<ext>` next to the input.
fn default_output(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}_cut.{}", format.extension()))
}

/// Resolve the output path and format from the flags.
fn resolve_output(
    input: &Path,
    output: Option<PathBuf>,
    format: Option<&str>,
) -> anyhow::Result<(PathBuf, OutputFormat)> {
    let format = match format {
        Some(name) => name.parse::<OutputFormat>().map_err(|_| {
            anyhow::anyhow!("Unknown format: {name}. Use: mp3, m4a, wav, flac, ogg, mp4")
        })?,
        None => output
            .as_deref()
            .and_then(OutputFormat::from_path)
            .unwrap_or(OutputFormat::Mp3),
    };
    let output = output.unwrap_or_else(|| default_output(input, format));
    Ok((output, format))
}

pub async fn run(config: AppConfig, args: CutArgs) -> anyhow::Result<()> {
    let (output, format) = resolve_output(&args.input, args.output, args.format.as_deref())?;
    let quality: Quality = args.quality.parse().map_err(|_| {
        anyhow::anyhow!("Unknown quality: {}. Use: high, medium, low", args.quality)
    })?;

    let timeline = Timeline::load(&args.subtitles)
        .map_err(|e| anyhow::anyhow!("Failed to load subtitles: {e}"))?;

    let mut job = CutJob::new(args.input, args.subtitles, output);
    job.format = format;
    job.quality = quality;
    job.subtitle_output = args.subtitle_output;
    job.rejections = args.selection.rejections()?;
    job.window = args.selection.window(&timeline);
    job.timeline = Some(timeline);
    job.segment_map = args.segment_map;
    job.batch_size = match args.batch_size {
        Some(requested) => {
            let clamped = CutDefaults::clamp_batch_size(requested);
            if clamped != requested {
                tracing::warn!(requested, clamped, "Batch size out of range; clamped");
            }
            clamped
        }
        None => config.cut.batch_size,
    };
    if args.merge_audio {
        job.extraction = ExtractionMode::Merged {
            gap_threshold_secs: config.cut.audio_gap_threshold_secs,
        };
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; stopping");
            let _ = cancel_tx.send(true);
        }
    });

    let runner = EncoderRunner::new(&config.encoder).with_cancel(cancel_rx.clone());
    runner
        .locate()
        .map_err(|e| anyhow::anyhow!("{e}. Install ffmpeg or set encoder.program in the config"))?;

    if !args.json {
        println!("Cutting: {}", job.input.display());
        println!("  Output: {}", job.output.display());
        println!("  Format: {} ({:?})", job.format, job.quality);
        println!("  Rejecting {} phrase(s)", job.rejections.len());
    }

    let mut ctx = CutContext::new(Arc::new(runner), Arc::new(SystemMemory), config);
    ctx.cancel = Some(cancel_rx);
    if !args.json {
        ctx.progress = Some(Arc::new(|p: CutProgress| {
            eprint!(
                "\r  {:<11} {:>5.1}% ({}/{})  ",
                p.stage.name(),
                p.fraction() * 100.0,
                p.completed,
                p.total
            );
            let _ = std::io::stderr().flush();
        }));
    }

    match run_cut(&job, &ctx).await {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                eprintln!();
                println!("Cut complete.");
                println!("{report}");
                if report.tier.is_some_and(|t| t.is_degraded()) {
                    println!(
                        "Warning: video was rebuilt from the uncut clip and is out of sync \
                         with the audio."
                    );
                }
            }
            Ok(())
        }
        Err(AutocutError::Cancelled) => {
            eprintln!();
            anyhow::bail!("Cancelled; intermediate files removed")
        }
        Err(e) => {
            eprintln!();
            Err(anyhow::anyhow!("Cut failed: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_output() {
        let input = Path::new("/media/talk.mp4");

        let (out, format) = resolve_output(input, None, None).unwrap();
        assert_eq!(out, PathBuf::from("/media/talk_cut.mp3"));
        assert_eq!(format, OutputFormat::Mp3);

        let (out, format) = resolve_output(input, None, Some("mp4")).unwrap();
        assert_eq!(out, PathBuf::from("/media/talk_cut.mp4"));
        assert_eq!(format, OutputFormat::Mp4);

        let (out, format) =
            resolve_output(input, Some(PathBuf::from("/tmp/x.flac")), None).unwrap();
        assert_eq!(out, PathBuf::from("/tmp/x.flac"));
        assert_eq!(format, OutputFormat::Flac);

        assert!(resolve_output(input, None, Some("gif")).is_err());
    }
}
