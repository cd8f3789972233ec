//! Static background video for audio-only input.

use std::path::Path;
use std::time::Duration;

use autocut_common::config::EncoderConfig;
use autocut_common::error::{AutocutError, AutocutResult};

use crate::command::{format_secs, Encoder, EncoderCommand};

/// Solid-colour lavfi source of `duration_secs`.
pub fn background_source(color: &str, resolution: &str, duration_secs: f64) -> String {
    format!("color=c={color}:s={resolution}:d={}", format_secs(duration_secs))
}

/// Render `audio` over a solid background into `output`.
///
/// The video lasts exactly as long as the probed audio. Returns that duration.
pub async fn synthesize_background(
    encoder: &dyn Encoder,
    config: &EncoderConfig,
    audio: &Path,
    output: &Path,
) -> AutocutResult<f64> {
    let duration = encoder.probe_duration(audio).await?;
    if duration <= 0.0 {
        return Err(AutocutError::unsupported(format!(
            "{} has no audible duration",
            audio.display()
        )));
    }
    tracing::info!(
        duration_secs = duration,
        resolution = %config.background_resolution,
        "Synthesising background video"
    );

    let cmd = EncoderCommand::new(output)
        .label("background")
        .lavfi_input(background_source(
            &config.background_color,
            &config.background_resolution,
            duration,
        ))
        .input(audio)
        .video_codec("libx264")
        .output_args(["-tune", "stillimage"])
        .audio_codec("aac")
        .output_args(["-b:a", "192k", "-shortest", "-pix_fmt", "yuv420p"]);
    encoder
        .run(&cmd, Duration::from_secs(config.default_timeout_secs))
        .await?;
    Ok(duration)
}
