use std::{
    io,
    path::{MAIN_SEPARATOR, Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdout, Command},
    task::JoinHandle,
};
use tracing::{debug, trace, warn};

use super::{ObservationSet, ProbeBatch, ProbeOptions, ProbeRunner};
use crate::{error::ProbeError, registry::ScanToken, settings::ProbeSettings};

/// Upper bound on captured stderr, so a chatty probe cannot grow memory
/// without limit.
const MAX_STDERR_BYTES: u64 = 64 * 1024;
const STDERR_SUMMARY_LINES: usize = 10;

/// Runs the probe binary as a child process, one process per batch.
#[derive(Debug, Clone)]
pub struct ProcessProbeRunner {
    binary: String,
}

impl ProcessProbeRunner {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn from_settings(settings: &ProbeSettings) -> Self {
        Self::new(settings.binary.clone())
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Locates the probe executable. A value containing a path separator must
    /// name an existing file; a bare name is looked up on `PATH`.
    pub fn resolve_binary(&self) -> Result<PathBuf, ProbeError> {
        let not_found = || ProbeError::BinaryNotFound {
            binary: self.binary.clone(),
        };

        if self.binary.contains(MAIN_SEPARATOR) || self.binary.contains('/') {
            let path = PathBuf::from(&self.binary);
            return if path.is_file() {
                Ok(path)
            } else {
                Err(not_found())
            };
        }

        which::which(&self.binary).map_err(|_| not_found())
    }

    fn spawn(&self, program: &Path, options: &ProbeOptions) -> Result<Child, ProbeError> {
        Command::new(program)
            .args(probe_args(options))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => ProbeError::BinaryNotFound {
                    binary: self.binary.clone(),
                },
                _ => ProbeError::Spawn {
                    binary: self.binary.clone(),
                    source,
                },
            })
    }
}

#[async_trait]
impl ProbeRunner for ProcessProbeRunner {
    fn ensure_available(&self) -> Result<(), ProbeError> {
        self.resolve_binary().map(|path| {
            debug!(binary = %path.display(), "probe binary resolved");
        })
    }

    async fn probe_batch(
        &self,
        hostnames: &[String],
        options: &ProbeOptions,
        token: &ScanToken,
    ) -> Result<ProbeBatch, ProbeError> {
        if token.is_cancelled() {
            return Err(ProbeError::Cancelled);
        }

        let program = self.resolve_binary()?;
        let mut child = self.spawn(&program, options)?;

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        let writer = spawn_stdin_writer(stdin, hostnames);
        let stderr_task = tokio::spawn(read_capped(stderr));

        // Dropping the drive future on cancellation drops the child, which
        // kills it (`kill_on_drop`).
        let driven = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = drive(child, stdout) => Some(result),
        };

        let Some(result) = driven else {
            writer.abort();
            stderr_task.abort();
            debug!(
                hosts = hostnames.len(),
                "probe invocation cancelled; process killed"
            );
            return Err(ProbeError::Cancelled);
        };

        let (observations, status) = result?;

        // The probe may exit before reading all of stdin, e.g. on a fatal flag
        // error; its exit status is what gets reported.
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(error = %err, "failed writing hostnames to probe stdin"),
            Err(err) => debug!(error = %err, "probe stdin writer task failed"),
        }

        let stderr = match stderr_task.await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                warn!(error = %err, "failed reading probe stderr");
                String::new()
            }
            Err(err) => {
                warn!(error = %err, "probe stderr reader task failed");
                String::new()
            }
        };

        let stderr = summarize_stderr(&stderr);
        if !status.success() {
            return Err(ProbeError::Exited {
                code: status.code(),
                stderr,
            });
        }

        trace!(
            hosts = hostnames.len(),
            matched = observations.hostnames(),
            observations = observations.observations(),
            dropped = observations.dropped(),
            "probe batch decoded"
        );

        Ok(ProbeBatch {
            observations,
            stderr,
        })
    }
}

/// Command-line flags for one invocation: JSON-lines output with status,
/// length, title, server and technology detection.
pub fn probe_args(options: &ProbeOptions) -> Vec<String> {
    let mut args: Vec<String> = [
        "-silent",
        "-no-color",
        "-json",
        "-status-code",
        "-content-length",
        "-title",
        "-web-server",
        "-tech-detect",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    args.push("-timeout".into());
    args.push(options.per_host_timeout.as_secs().max(1).to_string());
    args.push("-threads".into());
    args.push(options.threads.to_string());
    args.push("-retries".into());
    args.push(options.retries.to_string());

    if options.random_agent {
        args.push("-random-agent".into());
    }

    if let Some(proxy) = &options.proxy {
        args.push("-http-proxy".into());
        args.push(proxy.to_string());
    }

    args
}

async fn drive(
    mut child: Child,
    stdout: ChildStdout,
) -> Result<(ObservationSet, ExitStatus), ProbeError> {
    let mut observations = ObservationSet::default();
    let mut lines = BufReader::new(stdout).split(b'\n');

    while let Some(line) = lines.next_segment().await? {
        observations.push_bytes(&line);
    }

    let status = child.wait().await?;
    Ok((observations, status))
}

fn spawn_stdin_writer(
    mut stdin: tokio::process::ChildStdin,
    hostnames: &[String],
) -> JoinHandle<io::Result<()>> {
    let mut payload = hostnames.join("\n");
    payload.push('\n');

    tokio::spawn(async move {
        stdin.write_all(payload.as_bytes()).await?;
        stdin.shutdown().await?;
        Ok(())
    })
}

async fn read_capped<R>(reader: R) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut limited = reader.take(MAX_STDERR_BYTES);
    limited.read_to_end(&mut buffer).await?;

    // Drain the remainder so the child never blocks on a full pipe.
    let mut rest = limited.into_inner();
    tokio::io::copy(&mut rest, &mut tokio::io::sink()).await?;

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn summarize_stderr(stderr: &str) -> String {
    stderr
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(STDERR_SUMMARY_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

fn missing_pipe(name: &str) -> ProbeError {
    ProbeError::Io(io::Error::other(format!("probe {name} was not captured")))
}
