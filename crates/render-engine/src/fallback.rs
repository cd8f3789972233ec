//! Video reconstruction with tiered fallback.
//!
//! ```text
//! merged segments
//!       │
//!       ├── count <= ceiling ──► single-pass graph ──┐
//!       │                            │ fail          │
//!       ▼                            ▼               │
//!   chunked graphs ──► concat (stream copy) ─────────┤
//!       │ fail                                       ├──► mux with audio
//!       ▼                                            │
//!   contiguous clip (stream copy) ───────────────────┘
//!       │ fail
//!       ▼
//!   ReconstructionFailed
//! ```
//!
//! Tiers run one after another. A tier's failure is logged and the next tier
//! starts; cancellation and pre-flight failures end the chain at once.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use autocut_common::config::EncoderConfig;
use autocut_common::error::{AutocutError, AutocutResult};
use autocut_processing::{chunk_size, partition};
use autocut_timeline::Segment;

use crate::audio::write_concat_list;
use crate::command::{ensure_not_cancelled, Encoder, EncoderCommand};
use crate::filter_graph::{fits_single_graph, TrimConcatGraph, OUTPUT_PAD};
use crate::progress::{CutStage, ProgressReporter};

/// Strategy that produced the video track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconstructionTier {
    /// One trim/concat graph over every merged segment.
    SinglePass,
    /// One graph per chunk, joined by stream copy.
    Chunked,
    /// The uncut clip span; video is not in sync with the cut audio.
    ContiguousClip,
}

impl ReconstructionTier {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::ContiguousClip)
    }
}

impl fmt::Display for ReconstructionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SinglePass => "single-pass",
            Self::Chunked => "chunked",
            Self::ContiguousClip => "contiguous-clip",
        })
    }
}

/// Inputs of one reconstruction.
#[derive(Debug, Clone)]
pub struct VideoJob<'a> {
    /// Original video file.
    pub video: &'a Path,
    /// Merged source ranges, sorted.
    pub segments: &'a [Segment],
    /// Span of the selection window in the original.
    pub clip: Segment,
    /// Already-encoded cut audio.
    pub audio: &'a Path,
    /// Muxed result.
    pub output: &'a Path,
}

/// Runs the fallback chain against an [`Encoder`].
#[derive(Clone)]
pub struct VideoReconstructor {
    encoder: Arc<dyn Encoder>,
    config: EncoderConfig,
    scratch: PathBuf,
    cancel: Option<watch::Receiver<bool>>,
    progress: ProgressReporter,
}

impl VideoReconstructor {
    pub fn new(encoder: Arc<dyn Encoder>, config: &EncoderConfig, scratch: &Path) -> Self {
        Self {
            encoder,
            config: config.clone(),
            scratch: scratch.to_path_buf(),
            cancel: None,
            progress: ProgressReporter::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Produce `job.output`, escalating through the tiers as they fail.
    pub async fn reconstruct(&self, job: &VideoJob<'_>) -> AutocutResult<ReconstructionTier> {
        let mut causes = Vec::new();
        let count = job.segments.len();

        if fits_single_graph(count, self.config.filter_graph_ceiling) {
            match self.single_pass(job).await {
                Ok(()) => return Ok(ReconstructionTier::SinglePass),
                Err(e) => self.escalate(ReconstructionTier::SinglePass, e, &mut causes)?,
            }
        } else {
            tracing::info!(
                segments = count,
                ceiling = self.config.filter_graph_ceiling,
                "Too many segments for one filter graph; skipping single pass"
            );
            causes.push(format!(
                "{}: {count} segments exceed the ceiling of {}",
                ReconstructionTier::SinglePass,
                self.config.filter_graph_ceiling
            ));
        }

        match self.chunked(job).await {
            Ok(()) => return Ok(ReconstructionTier::Chunked),
            Err(e) => self.escalate(ReconstructionTier::Chunked, e, &mut causes)?,
        }

        match self.contiguous_clip(job).await {
            Ok(()) => {
                tracing::warn!("Video rebuilt from the uncut clip; it will not match the cut audio");
                Ok(ReconstructionTier::ContiguousClip)
            }
            Err(e) => {
                self.escalate(ReconstructionTier::ContiguousClip, e, &mut causes)?;
                Err(AutocutError::ReconstructionFailed { causes })
            }
        }
    }

    /// Record a tier failure, or end the chain if it must not be recovered.
    fn escalate(
        &self,
        tier: ReconstructionTier,
        error: AutocutError,
        causes: &mut Vec<String>,
    ) -> AutocutResult<()> {
        if !error.is_recoverable_tier_failure() {
            return Err(error);
        }
        tracing::warn!(tier = %tier, error = %error, "Reconstruction tier failed");
        causes.push(format!("{tier}: {error}"));
        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.default_timeout_secs)
    }

    async fn single_pass(&self, job: &VideoJob<'_>) -> AutocutResult<()> {
        ensure_not_cancelled(self.cancel.as_ref())?;
        let graph = TrimConcatGraph::new(job.segments)?;
        tracing::info!(
            segments = graph.len(),
            output_secs = graph.output_duration(),
            "Tier 1: single-pass filter graph"
        );
        self.progress.report(CutStage::Video, 0, 1);

        let silent = self.scratch.join("merged_video_no_audio.mp4");
        let cmd = self
            .graph_command(job.video, &graph, &silent)
            .label("single-pass graph");
        self.encoder
            .run(&cmd, Duration::from_secs(self.config.single_pass_timeout_secs))
            .await?;

        self.mux(&silent, job.audio, job.output).await?;
        self.progress.report(CutStage::Video, 1, 1);
        Ok(())
    }

    async fn chunked(&self, job: &VideoJob<'_>) -> AutocutResult<()> {
        let size = chunk_size(
            job.segments.len(),
            self.config.target_chunks,
            self.config.max_chunk_segments,
        );
        let chunks = partition(job.segments, size);
        tracing::info!(
            segments = job.segments.len(),
            chunk_size = size,
            chunks = chunks.len(),
            "Tier 2: chunked filter graphs"
        );

        let timeout = Duration::from_secs(self.config.chunk_timeout_secs);
        let mut parts = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            ensure_not_cancelled(self.cancel.as_ref())?;
            self.progress.report(CutStage::Video, chunk.index, chunks.len());

            let graph = TrimConcatGraph::new(chunk.items)?;
            let part = self.scratch.join(format!("chunk_{}.mp4", chunk.index));
            let cmd = self
                .graph_command(job.video, &graph, &part)
                .label(format!("chunk {}", chunk.index));
            self.encoder.run(&cmd, timeout).await?;
            tracing::debug!(
                chunk = chunk.index,
                segments = graph.len(),
                output_secs = graph.output_duration(),
                "Chunk rendered"
            );
            parts.push(part);
        }

        ensure_not_cancelled(self.cancel.as_ref())?;
        let list = self.scratch.join("video_chunks.txt");
        write_concat_list(&list, &parts)?;
        let joined = self.scratch.join("chunked_video_no_audio.mp4");
        let concat = EncoderCommand::new(&joined)
            .label("concat chunks")
            .concat_input(&list)
            .stream_copy();
        self.encoder.run(&concat, self.timeout()).await?;

        self.mux(&joined, job.audio, job.output).await?;
        self.progress.report(CutStage::Video, chunks.len(), chunks.len());
        Ok(())
    }

    async fn contiguous_clip(&self, job: &VideoJob<'_>) -> AutocutResult<()> {
        ensure_not_cancelled(self.cancel.as_ref())?;
        tracing::info!(
            start = job.clip.start,
            end = job.clip.end,
            "Tier 3: contiguous clip"
        );

        let clip = self.scratch.join("clip_video.mp4");
        let cmd = EncoderCommand::new(&clip)
            .label("contiguous clip")
            .input_span(job.video, job.clip.start, job.clip.duration())
            .stream_copy();
        self.encoder.run(&cmd, self.timeout()).await?;

        self.mux(&clip, job.audio, job.output).await
    }

    fn graph_command(&self, video: &Path, graph: &TrimConcatGraph, output: &Path) -> EncoderCommand {
        EncoderCommand::new(output)
            .input(video)
            .filter_complex(graph.expression())
            .map(OUTPUT_PAD)
            .video_codec("libx264")
            .output_args(["-preset", "faster", "-an"])
    }

    /// Combine a video track with the cut audio, copying the video stream.
    pub async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> AutocutResult<()> {
        ensure_not_cancelled(self.cancel.as_ref())?;
        let cmd = EncoderCommand::new(output)
            .label("mux")
            .input(video)
            .input(audio)
            .map("0:v:0")
            .map("1:a:0")
            .video_codec("copy")
            .audio_codec("aac");
        self.encoder.run(&cmd, self.timeout()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use autocut_common::error::EncoderFailure;
    use std::sync::Mutex;

    /// Records every command; fails those whose label starts with a listed prefix.
    struct ScriptedEncoder {
        fail_prefixes: Vec<&'static str>,
        cancel_on: Option<&'static str>,
        calls: Mutex<Vec<(String, Duration)>>,
    }

    impl ScriptedEncoder {
        fn failing(fail_prefixes: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                fail_prefixes,
                cancel_on: None,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn labels(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(l, _)| l.clone()).collect()
        }
    }

    #[async_trait]
    impl Encoder for ScriptedEncoder {
        async fn run(&self, command: &EncoderCommand, timeout: Duration) -> AutocutResult<()> {
            let label = command.label_str().to_string();
            self.calls.lock().unwrap().push((label.clone(), timeout));
            if self.cancel_on.is_some_and(|p| label.starts_with(p)) {
                return Err(AutocutError::Cancelled);
            }
            if self.fail_prefixes.iter().any(|p| label.starts_with(p)) {
                return Err(EncoderFailure::new("ffmpeg", Some(1), "scripted failure", 500).into());
            }
            Ok(())
        }

        async fn query(&self, _args: &[&str]) -> AutocutResult<String> {
            Ok(String::new())
        }

        async fn probe_duration(&self, _path: &Path) -> AutocutResult<f64> {
            Ok(0.0)
        }
    }

    fn segments(n: usize) -> Vec<Segment> {
        (0..n)
            .map(|i| Segment::new(i as f64 * 2.0, i as f64 * 2.0 + 1.0))
            .collect()
    }

    async fn run(encoder: Arc<ScriptedEncoder>, n: usize) -> AutocutResult<ReconstructionTier> {
        let dir = tempfile::tempdir().unwrap();
        let segs = segments(n);
        let reconstructor =
            VideoReconstructor::new(encoder, &EncoderConfig::default(), dir.path());
        let job = VideoJob {
            video: Path::new("in.mp4"),
            segments: &segs,
            clip: Segment::new(0.0, n as f64 * 2.0),
            audio: Path::new("audio.mp3"),
            output: Path::new("out.mp4"),
        };
        reconstructor.reconstruct(&job).await
    }

    #[tokio::test]
    async fn test_single_pass_succeeds() {
        let encoder = ScriptedEncoder::failing(vec![]);
        let tier = run(Arc::clone(&encoder), 12).await.unwrap();
        assert_eq!(tier, ReconstructionTier::SinglePass);

        let calls = encoder.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "single-pass graph");
        assert_eq!(calls[0].1, Duration::from_secs(1800));
        assert_eq!(calls[1].0, "mux");
    }

    #[tokio::test]
    async fn test_over_ceiling_skips_single_pass() {
        let encoder = ScriptedEncoder::failing(vec![]);
        let tier = run(Arc::clone(&encoder), 60).await.unwrap();
        assert_eq!(tier, ReconstructionTier::Chunked);

        let calls = encoder.calls.lock().unwrap().clone();
        assert!(calls.iter().all(|(l, _)| l != "single-pass graph"));
        let chunks: Vec<_> = calls.iter().filter(|(l, _)| l.starts_with("chunk ")).collect();
        assert_eq!(chunks.len(), 6);
        assert!(chunks.iter().all(|(_, t)| *t == Duration::from_secs(1200)));
        assert_eq!(
            encoder.labels()[6..].to_vec(),
            vec!["concat chunks".to_string(), "mux".to_string()]
        );
    }

    #[tokio::test]
    async fn test_single_pass_failure_escalates_to_chunks() {
        let encoder = ScriptedEncoder::failing(vec!["single-pass"]);
        let tier = run(Arc::clone(&encoder), 20).await.unwrap();
        assert_eq!(tier, ReconstructionTier::Chunked);
        // 20 / 5 = 4 segments per chunk
        let chunk_runs = encoder
            .labels()
            .iter()
            .filter(|l| l.starts_with("chunk "))
            .count();
        assert_eq!(chunk_runs, 5);
    }

    #[tokio::test]
    async fn test_chunk_failure_falls_back_to_clip() {
        let encoder = ScriptedEncoder::failing(vec!["single-pass", "chunk 2"]);
        let tier = run(Arc::clone(&encoder), 20).await.unwrap();
        assert_eq!(tier, ReconstructionTier::ContiguousClip);
        assert!(tier.is_degraded());

        let labels = encoder.labels();
        assert!(!labels.contains(&"chunk 3".to_string()));
        assert_eq!(
            labels[labels.len() - 2..].to_vec(),
            vec!["contiguous clip".to_string(), "mux".to_string()]
        );
    }

    #[tokio::test]
    async fn test_all_tiers_fail() {
        let encoder = ScriptedEncoder::failing(vec!["single-pass", "chunk", "contiguous"]);
        match run(encoder, 8).await {
            Err(AutocutError::ReconstructionFailed { causes }) => {
                assert_eq!(causes.len(), 3);
                assert!(causes[0].starts_with("single-pass"));
                assert!(causes[2].contains("scripted failure"));
            }
            other => panic!("expected ReconstructionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancellation_is_not_recovered() {
        let encoder = Arc::new(ScriptedEncoder {
            fail_prefixes: vec![],
            cancel_on: Some("single-pass"),
            calls: Mutex::new(Vec::new()),
        });
        assert!(matches!(
            run(Arc::clone(&encoder), 4).await,
            Err(AutocutError::Cancelled)
        ));
        assert_eq!(encoder.labels(), vec!["single-pass graph".to_string()]);
    }

    #[tokio::test]
    async fn test_cancel_flag_stops_before_first_tier() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = watch::channel(true);
        let encoder = ScriptedEncoder::failing(vec![]);
        let segs = segments(3);
        let reconstructor = VideoReconstructor::new(
            Arc::clone(&encoder) as Arc<dyn Encoder>,
            &EncoderConfig::default(),
            dir.path(),
        )
        .with_cancel(rx);
        let job = VideoJob {
            video: Path::new("in.mp4"),
            segments: &segs,
            clip: Segment::new(0.0, 6.0),
            audio: Path::new("audio.mp3"),
            output: Path::new("out.mp4"),
        };
        assert!(matches!(
            reconstructor.reconstruct(&job).await,
            Err(AutocutError::Cancelled)
        ));
        assert!(encoder.labels().is_empty());
        drop(tx);
    }
}
