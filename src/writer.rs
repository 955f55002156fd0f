//! Persist emitted units, optionally through an external formatter.
//!
//! Formatting is best effort. Whatever happens to the formatter (missing,
//! non-zero exit, timeout), the unformatted unit is still written.
use std::borrow::Cow;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use fs_err as fs;
use tracing::{debug, info, warn};

use crate::error::{Advisory, Result};
use crate::target::Target;

pub const DEFAULT_OUT_DIR: &str = "corrections";
pub const DEFAULT_FORMATTER: &str = "clang-format";
pub const DEFAULT_FORMATTER_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ------------------------------ Formatter --------------------------------- //

/// External pretty-printer fed on stdin, read back from stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatter {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Default for Formatter {
    fn default() -> Self {
        Self {
            program: DEFAULT_FORMATTER.to_string(),
            args: Vec::new(),
            timeout: DEFAULT_FORMATTER_TIMEOUT,
        }
    }
}

impl Formatter {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), ..Self::default() }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn failed(&self, reason: impl Into<String>) -> Advisory {
        Advisory::FormatterFailed { program: self.program.clone(), reason: reason.into() }
    }

    /// Run the formatter over `input`. Errors are advisories: the caller
    /// falls back to `input`.
    pub fn run(&self, input: &str) -> Result<String, Advisory> {
        let spawned = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(Advisory::FormatterUnavailable { program: self.program.clone() });
            }
            Err(error) => return Err(self.failed(error.to_string())),
        };

        let (Some(mut stdin), Some(mut stdout), Some(mut stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(self.failed("formatter pipes were not captured"));
        };

        // stdin is closed when the writer thread drops it
        let source = input.to_owned();
        let feeder = thread::spawn(move || stdin.write_all(source.as_bytes()));
        let out_reader = thread::spawn(move || {
            let mut buf = String::new();
            stdout.read_to_string(&mut buf).map(|_| buf)
        });
        let err_reader = thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        });

        let status = self.wait_with_deadline(&mut child)?;

        let fed = feeder.join().map_err(|_| self.failed("stdin writer panicked"))?;
        let formatted = out_reader
            .join()
            .map_err(|_| self.failed("stdout reader panicked"))?
            .map_err(|error| self.failed(format!("reading stdout: {error}")))?;
        let diagnostics = err_reader.join().unwrap_or_default();

        if !status.success() {
            let diagnostics = diagnostics.trim();
            return Err(if diagnostics.is_empty() {
                self.failed(status.to_string())
            } else {
                self.failed(format!("{status}: {diagnostics}"))
            });
        }
        if let Err(error) = fed {
            return Err(self.failed(format!("writing stdin: {error}")));
        }
        if formatted.trim().is_empty() && !input.trim().is_empty() {
            return Err(self.failed("formatter produced no output"));
        }
        Ok(formatted)
    }

    fn wait_with_deadline(&self, child: &mut std::process::Child) -> Result<ExitStatus, Advisory> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(self.failed(format!("timed out after {:?}", self.timeout)));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(error) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(self.failed(error.to_string()));
                }
            }
        }
    }
}

// ------------------------------- Writer ----------------------------------- //

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatStatus {
    Formatted,
    Disabled,
    /// formatter unavailable or failed; raw text was written
    Raw(Advisory),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub path: PathBuf,
    pub status: FormatStatus,
}

#[derive(Debug, Clone)]
pub struct OutputWriter {
    out_dir: PathBuf,
    formatter: Option<Formatter>,
}

impl Default for OutputWriter {
    fn default() -> Self {
        Self::new(DEFAULT_OUT_DIR)
    }
}

impl OutputWriter {
    /// Writer into `out_dir` using the default formatter.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self { out_dir: out_dir.into(), formatter: Some(Formatter::default()) }
    }

    pub fn with_formatter(mut self, formatter: Option<Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn path_for(&self, correction_name: &str, target: Target) -> PathBuf {
        self.out_dir.join(format!("{correction_name}.{}", target.file_extension()))
    }

    pub fn write(&self, correction_name: &str, target: Target, source: &str) -> Result<WriteOutcome> {
        fs::create_dir_all(&self.out_dir)?;
        let path = self.path_for(correction_name, target);

        let (text, status) = match &self.formatter {
            None => (Cow::Borrowed(source), FormatStatus::Disabled),
            Some(formatter) => match formatter.run(source) {
                Ok(formatted) => (Cow::Owned(formatted), FormatStatus::Formatted),
                Err(advisory) => {
                    warn!(correction = correction_name, "{advisory}");
                    (Cow::Borrowed(source), FormatStatus::Raw(advisory))
                }
            },
        };
        debug!(correction = correction_name, status = ?status, "formatting");

        fs::write(&path, text.as_bytes())?;
        info!(path = %path.display(), "wrote correction");
        Ok(WriteOutcome { path, status })
    }
}

// ------------------------------- Tests ------------------------------------ //
