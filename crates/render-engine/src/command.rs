//! External encoder commands and the process-owning runner.
//!
//! Every invocation is started in its own process group. The group is
//! killed once the leader exits, or earlier when the invocation times out or
//! is cancelled, so helpers spawned by the encoder never outlive the run.
//! Reading the captured output shares the invocation's deadline.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use autocut_common::config::EncoderConfig;
use autocut_common::error::{AutocutError, AutocutResult, EncoderFailure};

/// Timeout for capability listings and probes.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// One input of an encoder command, with the options that precede it.
#[derive(Debug, Clone, PartialEq)]
struct EncoderInput {
    args: Vec<String>,
    source: String,
}

/// Builder for encoder command lines.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderCommand {
    inputs: Vec<EncoderInput>,
    output_args: Vec<String>,
    output: PathBuf,
    label: String,
}

impl EncoderCommand {
    /// Start a command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output_args: Vec::new(),
            output: output.as_ref().to_path_buf(),
            label: "encode".to_string(),
        }
    }

    /// Short name used in logs and diagnostics.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Add a plain file input.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with(Vec::<String>::new(), path)
    }

    /// Add an input preceded by its own options (seek, format, ...).
    pub fn input_with<I, S>(mut self, args: I, path: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(EncoderInput {
            args: args.into_iter().map(Into::into).collect(),
            source: path.as_ref().to_string_lossy().into_owned(),
        });
        self
    }

    /// Add a seeked, time-limited input.
    pub fn input_span(self, path: impl AsRef<Path>, start_secs: f64, duration_secs: f64) -> Self {
        self.input_with(
            [
                "-ss".to_string(),
                format_secs(start_secs.max(0.0)),
                "-t".to_string(),
                format_secs(duration_secs.max(0.0)),
            ],
            path,
        )
    }

    /// Add a concat-demuxer input reading a list file.
    pub fn concat_input(self, list: impl AsRef<Path>) -> Self {
        self.input_with(["-f", "concat", "-safe", "0"], list)
    }

    /// Add a lavfi source, e.g. a solid colour.
    pub fn lavfi_input(mut self, spec: impl Into<String>) -> Self {
        self.inputs.push(EncoderInput {
            args: vec!["-f".to_string(), "lavfi".to_string()],
            source: spec.into(),
        });
        self
    }

    /// Add one output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Copy all streams without re-encoding.
    pub fn stream_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    pub fn filter_complex(self, graph: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(graph)
    }

    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(stream)
    }

    pub fn threads(self, n: usize) -> Self {
        self.output_arg("-threads").output_arg(n.max(1).to_string())
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    pub fn label_str(&self) -> &str {
        &self.label
    }

    /// Full argument list, program name excluded.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
        ];
        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }
        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Seconds with microsecond precision, as the encoder expects them.
pub fn format_secs(secs: f64) -> String {
    format!("{secs:.6}")
}

/// Contract of the external encoder.
///
/// The real implementation is [`EncoderRunner`]; tests substitute scripted
/// encoders.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Run `command`, failing if it exceeds `timeout`.
    async fn run(&self, command: &EncoderCommand, timeout: Duration) -> AutocutResult<()>;

    /// Run the encoder with raw arguments and return its standard output.
    async fn query(&self, args: &[&str]) -> AutocutResult<String>;

    /// Duration of a media file in seconds.
    async fn probe_duration(&self, path: &Path) -> AutocutResult<f64>;
}

/// Captured output of a finished process.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs encoder processes with timeouts, cancellation, and group ownership.
#[derive(Debug, Clone)]
pub struct EncoderRunner {
    program: String,
    probe_program: String,
    diagnostic_limit: usize,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl EncoderRunner {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            program: config.program.clone(),
            probe_program: config.probe_program.clone(),
            diagnostic_limit: config.diagnostic_limit,
            cancel_rx: None,
        }
    }

    /// Abort running processes when the receiver flips to `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Resolve the encoder and probe executables.
    pub fn locate(&self) -> AutocutResult<(PathBuf, PathBuf)> {
        let find = |program: &str| {
            which::which(program).map_err(|_| AutocutError::EncoderNotFound {
                program: program.to_string(),
            })
        };
        Ok((find(&self.program)?, find(&self.probe_program)?))
    }

    /// Run `program` with `args`, owning its whole process group.
    pub async fn execute(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> AutocutResult<ProcessOutput> {
        ensure_not_cancelled(self.cancel_rx.as_ref())?;
        let deadline = Instant::now() + timeout;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AutocutError::EncoderNotFound {
                program: program.to_string(),
            },
            _ => AutocutError::Io(e),
        })?;
        let mut group = ProcessGroupGuard::new(child.id());

        tracing::debug!(program, pid = child.id(), args = ?args, "Encoder process started");

        let stdout_task = child.stdout.take().map(|mut out| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = out.read_to_end(&mut buf).await;
                buf
            })
        });
        let stderr_task = child.stderr.take().map(|mut err| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = err.read_to_end(&mut buf).await;
                buf
            })
        });

        let cancel_rx = self.cancel_rx.clone();
        let status = tokio::select! {
            status = child.wait() => status?,
            _ = tokio::time::sleep_until(deadline) => {
                tracing::warn!(
                    program,
                    timeout_secs = timeout.as_secs(),
                    "Encoder timed out; killing process group"
                );
                group.kill();
                let _ = child.wait().await;
                return Err(AutocutError::EncoderTimeout {
                    program: program.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            _ = wait_cancelled(cancel_rx) => {
                tracing::info!(program, "Cancelled; killing encoder process group");
                group.kill();
                let _ = child.wait().await;
                return Err(AutocutError::Cancelled);
            }
        };
        // Helpers left behind by the leader must not outlive it or hold the pipes open.
        group.kill();

        let (Some(stdout), Some(stderr)) = (
            collect(stdout_task, deadline).await,
            collect(stderr_task, deadline).await,
        ) else {
            tracing::warn!(program, "Encoder output still open at deadline");
            return Err(AutocutError::EncoderTimeout {
                program: program.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        };

        if !status.success() {
            let diagnostic = if stderr.trim().is_empty() { &stdout } else { &stderr };
            return Err(EncoderFailure::new(
                program,
                status.code(),
                diagnostic,
                self.diagnostic_limit,
            )
            .into());
        }

        Ok(ProcessOutput { stdout, stderr })
    }
}

#[async_trait]
impl Encoder for EncoderRunner {
    async fn run(&self, command: &EncoderCommand, timeout: Duration) -> AutocutResult<()> {
        tracing::debug!(
            label = command.label_str(),
            output = %command.output_path().display(),
            "Running encoder"
        );
        self.execute(&self.program, &command.build_args(), timeout)
            .await
            .map(|_| ())
    }

    async fn query(&self, args: &[&str]) -> AutocutResult<String> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        Ok(self.execute(&self.program, &args, QUERY_TIMEOUT).await?.stdout)
    }

    async fn probe_duration(&self, path: &Path) -> AutocutResult<f64> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path.to_string_lossy().into_owned(),
        ];
        let output = self
            .execute(&self.probe_program, &args, QUERY_TIMEOUT)
            .await?;
        parse_duration(&output.stdout).ok_or_else(|| {
            AutocutError::Other(anyhow::anyhow!(
                "{} reported no duration for {}",
                self.probe_program,
                path.display()
            ))
        })
    }
}

/// Parse the first line of a duration probe.
pub fn parse_duration(stdout: &str) -> Option<f64> {
    let value: f64 = stdout.lines().next()?.trim().parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Fail with `Cancelled` if cancellation was requested.
pub fn ensure_not_cancelled(cancel_rx: Option<&watch::Receiver<bool>>) -> AutocutResult<()> {
    match cancel_rx {
        Some(rx) if *rx.borrow() => Err(AutocutError::Cancelled),
        _ => Ok(()),
    }
}

async fn wait_cancelled(cancel_rx: Option<watch::Receiver<bool>>) {
    match cancel_rx {
        Some(mut rx) => {
            if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                // Sender gone without cancelling: never fires.
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

/// Drain a pipe reader, giving up at `deadline`.
async fn collect(task: Option<JoinHandle<Vec<u8>>>, deadline: Instant) -> Option<String> {
    let Some(mut handle) = task else {
        return Some(String::new());
    };
    match tokio::time::timeout_at(deadline, &mut handle).await {
        Ok(joined) => Some(
            joined
                .map(|buf| String::from_utf8_lossy(&buf).into_owned())
                .unwrap_or_default(),
        ),
        Err(_) => {
            handle.abort();
            None
        }
    }
}

/// Owns a child's process group and kills it at the latest on drop.
#[derive(Debug)]
pub struct ProcessGroupGuard {
    pgid: Option<i32>,
}

impl ProcessGroupGuard {
    /// Take ownership of the group led by `pid`.
    pub fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.and_then(|p| i32::try_from(p).ok()).filter(|p| *p > 0),
        }
    }

    /// SIGKILL every process in the group. An already-empty group is fine.
    pub fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            #[cfg(unix)]
            {
                // SAFETY: killpg only sends a signal; pgid is a group we created.
                let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
                let err = std::io::Error::last_os_error();
                if rc != 0 && err.raw_os_error() != Some(libc::ESRCH) {
                    tracing::debug!(pgid, error = %err, "killpg failed");
                }
            }
            #[cfg(not(unix))]
            let _ = pgid;
        }
    }

}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}
