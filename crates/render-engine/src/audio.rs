//! Output formats and assembly of batch audio into the final stream.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use autocut_common::config::EncoderConfig;
use autocut_common::error::{AutocutError, AutocutResult};

use crate::capability::AacEncoder;
use crate::command::{Encoder, EncoderCommand};
use crate::extractor::hound_error;

/// Container extensions treated as video input.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "avi", "webm", "flv"];

/// Whether `path` names a video container.
pub fn is_video_container(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Final artifact format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Mp3,
    M4a,
    Wav,
    Flac,
    Ogg,
    Mp4,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
            Self::Mp4 => "mp4",
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Mp4)
    }

    /// Infer from an output file name.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()?.to_str()?.parse().ok()
    }
}

impl FromStr for OutputFormat {
    type Err = AutocutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "m4a" | "aac" => Ok(Self::M4a),
            "wav" => Ok(Self::Wav),
            "flac" => Ok(Self::Flac),
            "ogg" => Ok(Self::Ogg),
            "mp4" => Ok(Self::Mp4),
            other => Err(AutocutError::unsupported(format!(
                "output format {other:?} (use mp3, m4a, wav, flac, ogg, mp4)"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Lossy encoding quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    High,
    Medium,
    Low,
}

impl Quality {
    /// LAME VBR quality (`-q:a`), lower is better.
    pub fn mp3_qscale(&self) -> &'static str {
        match self {
            Self::High => "2",
            Self::Medium => "4",
            Self::Low => "6",
        }
    }

    /// Vorbis quality (`-q:a`), higher is better.
    pub fn vorbis_quality(&self) -> &'static str {
        match self {
            Self::High => "8",
            Self::Medium => "5",
            Self::Low => "3",
        }
    }
}

impl FromStr for Quality {
    type Err = AutocutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(AutocutError::unsupported(format!(
                "quality {other:?} (use high, medium, low)"
            ))),
        }
    }
}

/// Turns batch WAVs into one encoded audio file.
#[derive(Clone)]
pub struct AudioAssembler {
    encoder: Arc<dyn Encoder>,
    config: EncoderConfig,
    max_workers: usize,
    scratch: PathBuf,
}

impl AudioAssembler {
    /// Intermediate files are written under `scratch`.
    pub fn new(
        encoder: Arc<dyn Encoder>,
        config: &EncoderConfig,
        max_workers: usize,
        scratch: &Path,
    ) -> Self {
        Self {
            encoder,
            config: config.clone(),
            max_workers: max_workers.max(1),
            scratch: scratch.to_path_buf(),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.default_timeout_secs)
    }

    /// Assemble `batches` (in order) into `output` as `format`.
    ///
    /// `Mp4` is not an audio format; callers produce MP3 audio first and
    /// hand it to the video stage.
    pub async fn assemble(
        &self,
        batches: &[PathBuf],
        format: OutputFormat,
        quality: Quality,
        output: &Path,
    ) -> AutocutResult<()> {
        tracing::info!(batches = batches.len(), format = %format, "Assembling audio");
        match format {
            OutputFormat::Wav => {
                self.concat_in_process(batches, output).await?;
            }
            OutputFormat::Mp3 | OutputFormat::Mp4 => {
                self.to_mp3(batches, quality, output).await?;
            }
            OutputFormat::M4a => {
                let merged = self.scratch.join("merged.wav");
                self.concat_in_process(batches, &merged).await?;
                self.to_aac(&merged, output).await?;
            }
            OutputFormat::Flac => {
                let merged = self.scratch.join("merged.wav");
                self.concat_in_process(batches, &merged).await?;
                let cmd = EncoderCommand::new(output)
                    .label("flac")
                    .input(&merged)
                    .audio_codec("flac");
                self.encoder.run(&cmd, self.timeout()).await?;
            }
            OutputFormat::Ogg => {
                let merged = self.scratch.join("merged.wav");
                self.concat_in_process(batches, &merged).await?;
                let cmd = EncoderCommand::new(output)
                    .label("vorbis")
                    .input(&merged)
                    .audio_codec("libvorbis")
                    .output_args(["-q:a", quality.vorbis_quality()]);
                self.encoder.run(&cmd, self.timeout()).await?;
            }
        }
        Ok(())
    }

    async fn concat_in_process(&self, batches: &[PathBuf], output: &Path) -> AutocutResult<()> {
        let inputs = batches.to_vec();
        let output = output.to_path_buf();
        tokio::task::spawn_blocking(move || concat_wavs(&inputs, &output))
            .await
            .map_err(|e| AutocutError::Other(anyhow::anyhow!("WAV concat task failed: {e}")))??;
        Ok(())
    }

    /// Compress each batch to MP3 concurrently, then join the parts by stream copy.
    pub async fn to_mp3(
        &self,
        batches: &[PathBuf],
        quality: Quality,
        output: &Path,
    ) -> AutocutResult<()> {
        let parts_dir = self.scratch.join("mp3_parts");
        std::fs::create_dir_all(&parts_dir)?;

        let permits = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks = JoinSet::new();
        for (index, wav) in batches.iter().enumerate() {
            let part = parts_dir.join(format!("{index:04}.mp3"));
            let cmd = EncoderCommand::new(&part)
                .label(format!("mp3 part {index}"))
                .input(wav)
                .audio_codec("libmp3lame")
                .output_args(["-q:a", quality.mp3_qscale()])
                .threads(self.max_workers)
                .output_args(["-write_xing", "0"]);
            let encoder = Arc::clone(&self.encoder);
            let permits = Arc::clone(&permits);
            let timeout = self.timeout();
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| AutocutError::Other(anyhow::anyhow!("semaphore closed: {e}")))?;
                encoder.run(&cmd, timeout).await?;
                Ok::<_, AutocutError>((index, part))
            });
        }

        let mut parts: Vec<Option<PathBuf>> = vec![None; batches.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, part) = joined
                .map_err(|e| AutocutError::Other(anyhow::anyhow!("MP3 task failed: {e}")))??;
            parts[index] = Some(part);
        }
        let parts: Vec<PathBuf> = parts.into_iter().flatten().collect();
        tracing::debug!(parts = parts.len(), "Compressed MP3 parts");

        self.concat_copy(&parts, output, "mp3 concat").await
    }

    /// Join media files of identical encoding without re-encoding.
    pub async fn concat_copy(&self, parts: &[PathBuf], output: &Path, label: &str) -> AutocutResult<()> {
        let list = self.scratch.join(format!("{}.txt", label.replace(' ', "_")));
        write_concat_list(&list, parts)?;
        let cmd = EncoderCommand::new(output)
            .label(label)
            .concat_input(&list)
            .stream_copy();
        self.encoder.run(&cmd, self.timeout()).await
    }

    /// Encode `input` to AAC with the best available implementation.
    ///
    /// If the direct encode fails, the input is decoded to a lossless
    /// intermediate and the encode is retried once from there.
    pub async fn to_aac(&self, input: &Path, output: &Path) -> AutocutResult<AacEncoder> {
        let aac = AacEncoder::detect(self.encoder.as_ref()).await;
        let direct = self.aac_command(input, output, aac).label("aac");
        match self.encoder.run(&direct, self.timeout()).await {
            Ok(()) => return Ok(aac),
            Err(e) if !e.is_recoverable_tier_failure() => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Direct AAC encode failed; retrying from lossless intermediate");
            }
        }

        let intermediate = self.scratch.join("aac_fallback.wav");
        let decode = EncoderCommand::new(&intermediate)
            .label("aac fallback decode")
            .input(input)
            .audio_codec("pcm_s16le")
            .output_args([
                "-ar".to_string(),
                self.config.sample_rate.to_string(),
                "-ac".to_string(),
                self.config.channels.to_string(),
            ]);
        self.encoder.run(&decode, self.timeout()).await?;

        let retry = self.aac_command(&intermediate, output, aac).label("aac retry");
        self.encoder.run(&retry, self.timeout()).await?;
        Ok(aac)
    }

    fn aac_command(&self, input: &Path, output: &Path, aac: AacEncoder) -> EncoderCommand {
        EncoderCommand::new(output)
            .input(input)
            .output_args(aac.args())
            .output_args(["-movflags", "+faststart"])
            .threads(self.max_workers.min(2))
            .output_args(["-max_muxing_queue_size", "9999"])
    }
}

/// Concatenate WAV files sample-exactly. Returns the number of samples written.
pub fn concat_wavs(inputs: &[PathBuf], output: &Path) -> AutocutResult<u64> {
    let first = inputs
        .first()
        .ok_or_else(|| AutocutError::unsupported("no audio batches to concatenate"))?;
    let spec = hound::WavReader::open(first).map_err(hound_error)?.spec();

    let mut writer = hound::WavWriter::create(output, spec).map_err(hound_error)?;
    let mut written = 0u64;
    for input in inputs {
        let mut reader = hound::WavReader::open(input).map_err(hound_error)?;
        if reader.spec() != spec {
            return Err(AutocutError::unsupported(format!(
                "{} does not match the layout of {}",
                input.display(),
                first.display()
            )));
        }
        for sample in reader.samples::<i16>() {
            writer.write_sample(sample.map_err(hound_error)?).map_err(hound_error)?;
            written += 1;
        }
    }
    writer.finalize().map_err(hound_error)?;
    Ok(written)
}

/// Write a concat-demuxer list naming `paths` in order.
pub fn write_concat_list(list: &Path, paths: &[PathBuf]) -> AutocutResult<()> {
    let body: String = paths
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', "'\\''")))
        .collect();
    std::fs::write(list, body)?;
    Ok(())
}
