//! Orchestration of one cutting run.
//!
//! Steps run strictly in sequence. Every intermediate artifact lives in the
//! run's [`WorkDir`]; the final file is staged there too and only moved into
//! place once everything else has succeeded.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use autocut_common::clock::RunClock;
use autocut_common::config::{AppConfig, CutDefaults};
use autocut_common::error::{AutocutError, AutocutResult};
use autocut_common::memory::{ensure_memory_floor, MemoryProbe};
use autocut_common::workdir::WorkDir;
use autocut_processing::{
    partition, plan_extraction, plan_video_segments, renumber, select, total_duration,
    ExtractionMode, Selection, SelectionWindow,
};
use autocut_timeline::{
    segment_map_path_for, write_segment_map, write_srt, RejectionSet, RetainedEntry, Segment,
    Timeline,
};

use crate::audio::{is_video_container, AudioAssembler, OutputFormat, Quality};
use crate::command::{ensure_not_cancelled, Encoder, EncoderCommand};
use crate::extractor::AudioExtractor;
use crate::fallback::{ReconstructionTier, VideoJob, VideoReconstructor};
use crate::pcm::PcmSource;
use crate::progress::{CutStage, ProgressCallback, ProgressReporter};
use crate::report::CutReport;
use crate::synth::synthesize_background;

/// A cutting job.
#[derive(Debug, Clone)]
pub struct CutJob {
    /// Audio or video file to cut.
    pub input: PathBuf,

    /// Subtitle file describing `input`.
    pub subtitles: PathBuf,

    /// `subtitles` already parsed by the caller; read from disk when absent.
    pub timeline: Option<Timeline>,

    /// Final artifact.
    pub output: PathBuf,

    /// Retimed subtitles; defaults to `output` with an `.srt` extension.
    pub subtitle_output: Option<PathBuf>,

    /// Cue texts to remove.
    pub rejections: RejectionSet,

    /// Window of cues to consider; the whole file when absent.
    pub window: Option<SelectionWindow>,

    pub format: OutputFormat,

    pub quality: Quality,

    /// Retained entries per extraction batch.
    pub batch_size: usize,

    pub extraction: ExtractionMode,

    /// Also write a segment map next to the subtitles.
    pub segment_map: bool,
}

impl CutJob {
    /// Job with defaults for everything but the paths.
    pub fn new(
        input: impl Into<PathBuf>,
        subtitles: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        let output = output.into();
        let format = OutputFormat::from_path(&output).unwrap_or(OutputFormat::Mp3);
        Self {
            input: input.into(),
            subtitles: subtitles.into(),
            timeline: None,
            output,
            subtitle_output: None,
            rejections: RejectionSet::new(),
            window: None,
            format,
            quality: Quality::default(),
            batch_size: CutDefaults::default().batch_size,
            extraction: ExtractionMode::default(),
            segment_map: false,
        }
    }

    pub fn subtitle_path(&self) -> PathBuf {
        self.subtitle_output
            .clone()
            .unwrap_or_else(|| self.output.with_extension("srt"))
    }
}

/// Collaborators of a run.
#[derive(Clone)]
pub struct CutContext {
    pub encoder: Arc<dyn Encoder>,
    pub memory: Arc<dyn MemoryProbe>,
    pub config: AppConfig,
    pub progress: Option<ProgressCallback>,
    pub cancel: Option<watch::Receiver<bool>>,
    /// Parent of the run's working directory; the system temp dir when absent.
    pub scratch_parent: Option<PathBuf>,
}

impl CutContext {
    pub fn new(
        encoder: Arc<dyn Encoder>,
        memory: Arc<dyn MemoryProbe>,
        config: AppConfig,
    ) -> Self {
        Self {
            encoder,
            memory,
            config,
            progress: None,
            cancel: None,
            scratch_parent: None,
        }
    }

    fn check_cancelled(&self) -> AutocutResult<()> {
        ensure_not_cancelled(self.cancel.as_ref())
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.encoder.default_timeout_secs)
    }

    fn workers(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.config.cut.max_workers.min(cores).max(1)
    }
}

/// Cut `job.input` along its subtitles.
///
/// Nothing is written to the output locations unless the whole run succeeds.
pub async fn run_cut(job: &CutJob, ctx: &CutContext) -> AutocutResult<CutReport> {
    let clock = RunClock::start();
    let progress = ProgressReporter::new(ctx.progress.clone());
    progress.report(CutStage::Preparing, 0, 1);

    tracing::info!(
        input = %job.input.display(),
        subtitles = %job.subtitles.display(),
        output = %job.output.display(),
        format = %job.format,
        "Starting cut"
    );

    if !job.input.exists() {
        return Err(AutocutError::file_not_found(&job.input));
    }
    let loaded;
    let timeline = match &job.timeline {
        Some(timeline) => timeline,
        None => {
            loaded = Timeline::load(&job.subtitles)?;
            &loaded
        }
    };
    tracing::debug!(
        entries = timeline.len(),
        subtitle_secs = timeline.duration(),
        "Subtitles loaded"
    );
    let window = job
        .window
        .unwrap_or_else(|| SelectionWindow::full(timeline.len()));
    let selection = select(timeline.entries(), window, &job.rejections)?;
    if selection.retained.is_empty() {
        return Err(AutocutError::NothingRetained);
    }
    let retained = renumber(&selection.retained);

    ensure_memory_floor(ctx.memory.as_ref(), ctx.config.cut.memory_floor_bytes)?;
    ctx.check_cancelled()?;

    let workdir = match &ctx.scratch_parent {
        Some(parent) => WorkDir::new_in(parent)?,
        None => WorkDir::new()?,
    };
    progress.report(CutStage::Preparing, 1, 1);

    let media = prepare_source(job, ctx, &workdir, &selection, &progress).await?;

    let extraction = plan_extraction(&retained, job.extraction, ctx.config.cut.min_segment_secs);
    let batches = extract_batches(job, ctx, &workdir, &media, &extraction, &progress).await?;

    ctx.check_cancelled()?;
    let staged = workdir.file(&format!("output.{}", job.format.extension()));
    let tier = encode_output(
        job, ctx, &workdir, &media, &selection, &retained, &batches, &staged, &progress,
    )
    .await?;

    ctx.check_cancelled()?;
    progress.report(CutStage::Subtitles, 0, 1);
    let output_bytes = std::fs::metadata(&staged)?.len();
    place_output(&staged, &job.output)?;

    let subtitle_path = job.subtitle_path();
    write_srt(&subtitle_path, &retained)?;
    let segment_map_path = if job.segment_map {
        let path = segment_map_path_for(&subtitle_path);
        write_segment_map(&path, &retained)?;
        Some(path)
    } else {
        None
    };
    progress.report(CutStage::Subtitles, 1, 1);

    workdir.close()?;

    let report = CutReport {
        output_path: job.output.clone(),
        output_bytes,
        subtitle_path,
        segment_map_path,
        format: job.format,
        clip_bytes: media.clip_bytes,
        considered: selection.considered,
        retained: retained.len(),
        batches: batches.len(),
        retained_secs: total_duration(&retained),
        tier,
        started_at: clock.started_wall().to_string(),
        elapsed_secs: clock.elapsed_secs(),
    };
    tracing::info!(
        output = %report.output_path.display(),
        output_bytes = report.output_bytes,
        clip_bytes = report.clip_bytes,
        ratio_pct = report.compression_ratio(),
        elapsed_secs = report.elapsed_secs,
        "Cut complete"
    );
    progress.report(CutStage::Complete, 1, 1);
    Ok(report)
}

/// Decoded clip and the files it came from.
struct PreparedMedia {
    /// Original video, when the input carries one.
    video: Option<PathBuf>,
    /// 16-bit PCM of the selection window.
    pcm: PathBuf,
    /// Absolute source time of the first PCM sample.
    clip_origin: f64,
    clip_bytes: u64,
}

async fn prepare_source(
    job: &CutJob,
    ctx: &CutContext,
    workdir: &WorkDir,
    selection: &Selection,
    progress: &ProgressReporter,
) -> AutocutResult<PreparedMedia> {
    let encoder = ctx.encoder.as_ref();
    let total_steps = 3;
    progress.report(CutStage::Decoding, 0, total_steps);

    let (audio, video) = if is_video_container(&job.input) {
        let extracted = workdir.file("extracted_audio.mp3");
        let cmd = EncoderCommand::new(&extracted)
            .label("extract audio")
            .input(&job.input)
            .output_arg("-vn")
            .audio_codec("libmp3lame")
            .output_args(["-q:a", "2"]);
        encoder.run(&cmd, ctx.timeout()).await?;
        (extracted, Some(job.input.clone()))
    } else {
        (job.input.clone(), None)
    };
    progress.report(CutStage::Decoding, 1, total_steps);
    ctx.check_cancelled()?;

    let extension = audio
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp3")
        .to_string();
    let clip = workdir.file(&format!("clip_source.{extension}"));
    let cmd = EncoderCommand::new(&clip)
        .label("extract clip")
        .input_span(&audio, selection.clip_start, selection.clip_duration())
        .audio_codec("copy")
        .output_args(["-max_muxing_queue_size", "9999"]);
    encoder.run(&cmd, ctx.timeout()).await?;
    let clip_bytes = std::fs::metadata(&clip)?.len();
    progress.report(CutStage::Decoding, 2, total_steps);
    ctx.check_cancelled()?;

    let pcm = workdir.file("clip.wav");
    let cmd = EncoderCommand::new(&pcm)
        .label("decode clip")
        .input(&clip)
        .audio_codec("pcm_s16le")
        .output_args([
            "-ar".to_string(),
            ctx.config.encoder.sample_rate.to_string(),
            "-ac".to_string(),
            ctx.config.encoder.channels.to_string(),
        ])
        .threads(ctx.workers());
    encoder.run(&cmd, ctx.timeout()).await?;
    progress.report(CutStage::Decoding, total_steps, total_steps);

    tracing::info!(
        clip_start = selection.clip_start,
        clip_end = selection.clip_end,
        clip_bytes,
        has_video = video.is_some(),
        "Prepared source clip"
    );
    Ok(PreparedMedia {
        video,
        pcm,
        clip_origin: selection.clip_start,
        clip_bytes,
    })
}

/// Extract `segments` batch by batch. Returns the batch WAVs in order.
async fn extract_batches(
    job: &CutJob,
    ctx: &CutContext,
    workdir: &WorkDir,
    media: &PreparedMedia,
    segments: &[Segment],
    progress: &ProgressReporter,
) -> AutocutResult<Vec<PathBuf>> {
    let source = Arc::new(PcmSource::open(&media.pcm)?);
    let extractor = AudioExtractor::new(
        source,
        media.clip_origin,
        ctx.workers(),
        Arc::clone(&ctx.memory),
        ctx.config.cut.memory_floor_bytes,
    );

    let batches = partition(segments, job.batch_size);
    tracing::info!(
        segments = segments.len(),
        batch_size = job.batch_size,
        batches = batches.len(),
        workers = extractor.worker_count(),
        "Extracting audio"
    );

    let mut paths = Vec::with_capacity(batches.len());
    for batch in &batches {
        ctx.check_cancelled()?;
        progress.report(CutStage::Extracting, batch.index, batches.len());

        let path = workdir.file(&batch.artifact_name("wav"));
        let items = batch.items.to_vec();
        let worker = extractor.clone();
        let target = path.clone();
        let bytes = tokio::task::spawn_blocking(move || worker.write_batch(&items, &target))
            .await
            .map_err(|e| AutocutError::Other(anyhow::anyhow!("extraction task failed: {e}")))??;
        tracing::info!(batch = batch.index, segments = batch.len(), bytes, "Batch extracted");
        paths.push(path);
    }
    progress.report(CutStage::Extracting, batches.len(), batches.len());
    Ok(paths)
}

#[allow(clippy::too_many_arguments)]
async fn encode_output(
    job: &CutJob,
    ctx: &CutContext,
    workdir: &WorkDir,
    media: &PreparedMedia,
    selection: &Selection,
    retained: &[RetainedEntry],
    batches: &[PathBuf],
    staged: &Path,
    progress: &ProgressReporter,
) -> AutocutResult<Option<ReconstructionTier>> {
    let assembler = AudioAssembler::new(
        Arc::clone(&ctx.encoder),
        &ctx.config.encoder,
        ctx.workers(),
        workdir.path(),
    );
    progress.report(CutStage::Encoding, 0, 1);

    if !job.format.is_video() {
        assembler
            .assemble(batches, job.format, job.quality, staged)
            .await?;
        progress.report(CutStage::Encoding, 1, 1);
        return Ok(None);
    }

    let audio = workdir.file("temp_audio.mp3");
    assembler.to_mp3(batches, job.quality, &audio).await?;
    progress.report(CutStage::Encoding, 1, 1);
    ctx.check_cancelled()?;

    match &media.video {
        Some(video) => {
            let segments = plan_video_segments(retained, ctx.config.cut.video_gap_threshold_secs);
            let mut reconstructor = VideoReconstructor::new(
                Arc::clone(&ctx.encoder),
                &ctx.config.encoder,
                workdir.path(),
            )
            .with_progress(progress.clone());
            if let Some(cancel) = &ctx.cancel {
                reconstructor = reconstructor.with_cancel(cancel.clone());
            }
            let tier = reconstructor
                .reconstruct(&VideoJob {
                    video,
                    segments: &segments,
                    clip: Segment::new(selection.clip_start, selection.clip_end),
                    audio: &audio,
                    output: staged,
                })
                .await?;
            Ok(Some(tier))
        }
        None => {
            progress.report(CutStage::Video, 0, 1);
            synthesize_background(ctx.encoder.as_ref(), &ctx.config.encoder, &audio, staged)
                .await?;
            progress.report(CutStage::Video, 1, 1);
            Ok(None)
        }
    }
}

/// Move the staged artifact to its destination.
fn place_output(staged: &Path, output: &Path) -> AutocutResult<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    if std::fs::rename(staged, output).is_err() {
        // Destination on another filesystem.
        std::fs::copy(staged, output)?;
        std::fs::remove_file(staged)?;
    }
    tracing::debug!(path = %output.display(), "Output placed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_subtitle_path() {
        let job = CutJob::new("talk.mp4", "talk.srt", "/out/cut.m4a");
        assert_eq!(job.subtitle_path(), PathBuf::from("/out/cut.srt"));
        assert_eq!(job.format, OutputFormat::M4a);

        let mut explicit = CutJob::new("a.mp3", "a.srt", "b.unknown");
        assert_eq!(explicit.format, OutputFormat::Mp3);
        explicit.subtitle_output = Some(PathBuf::from("subs/b.srt"));
        assert_eq!(explicit.subtitle_path(), PathBuf::from("subs/b.srt"));
    }

    #[test]
    fn test_place_output_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("output.wav");
        std::fs::write(&staged, b"RIFF").unwrap();
        let output = dir.path().join("nested/deeper/final.wav");
        place_output(&staged, &output).unwrap();
        assert!(!staged.exists());
        assert_eq!(std::fs::read(&output).unwrap(), b"RIFF");
    }
}
