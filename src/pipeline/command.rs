//! Bounded external-command execution.
//!
//! Every converter binary (`soffice`, `pdftoppm`) runs through
//! [`ToolCommand::run`]: spawn with stdin closed and output captured, wait
//! with an optional deadline, and on expiry kill the child and report
//! [`ConvertError::ToolTimeout`]. A missing executable, a non-zero exit and a
//! timeout are three distinct error variants.

use crate::error::ConvertError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Bytes of stderr kept in [`ConvertError::ToolFailed`].
const STDERR_TAIL: usize = 600;

/// An external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    tool: String,
    program: PathBuf,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    /// `tool` is the short name used in logs and errors, `program` the
    /// executable to spawn.
    pub fn new(tool: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Kill the process and fail with `ToolTimeout` if it runs longer than `limit`.
    pub fn timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    /// Run to completion. Succeeds only on exit status 0.
    pub async fn run(self) -> Result<Output, ConvertError> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.cwd {
            cmd.current_dir(dir);
        }

        debug!(
            tool = %self.tool,
            program = %self.program.display(),
            args = ?self.args,
            "Spawning external tool"
        );

        let start = Instant::now();
        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConvertError::ToolNotFound {
                    tool: self.tool.clone(),
                }
            } else {
                ConvertError::io(&self.program, e)
            }
        })?;

        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(res) => res,
                Err(_) => {
                    // The child is owned by the dropped future; kill_on_drop terminates it.
                    warn!(tool = %self.tool, secs = limit.as_secs(), "External tool timed out, killed");
                    return Err(ConvertError::ToolTimeout {
                        tool: self.tool,
                        secs: limit.as_secs(),
                    });
                }
            },
            None => child.wait_with_output().await,
        };
        let output = waited.map_err(|e| ConvertError::io(&self.program, e))?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        if !output.status.success() {
            let stderr = stderr_tail(&output.stderr);
            warn!(
                tool = %self.tool,
                status = %output.status,
                elapsed_ms,
                stderr = %stderr,
                "External tool failed"
            );
            return Err(ConvertError::ToolFailed {
                tool: self.tool,
                status: output.status.to_string(),
                stderr,
            });
        }

        info!(tool = %self.tool, elapsed_ms, "External tool finished");
        Ok(output)
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("\u{2026}{}", &text[start..])
}

/// `true` when `program` can be spawned on this host.
///
/// Some builds exit non-zero for their version flag, so any exit status counts.
pub async fn is_available(program: &Path, version_arg: &str) -> bool {
    let probe = ToolCommand::new("probe", program)
        .arg(version_arg)
        .timeout(Some(Duration::from_secs(5)))
        .run()
        .await;
    matches!(probe, Ok(_) | Err(ConvertError::ToolFailed { .. }))
}
