//! Delivery backends for encoded samples
//!
//! A sink receives the final JSON text of one sample. Sinks report failures
//! as errors; the sample's commit step turns them into warnings.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::error::TelemetryError;

/// Final delivery step for an encoded sample
pub trait SampleSink: Send + Sync + fmt::Debug {
    fn log_sample(&self, sample_data: &str) -> Result<(), TelemetryError>;
}

/// Runs a fixed command with the sample appended as its last argument
///
/// The call blocks until the command exits. There is no timeout, so a command
/// that hangs stalls the thread that committed the sample.
#[derive(Debug, Clone)]
pub struct ExternalSink {
    command: Vec<String>,
}

impl ExternalSink {
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
        }
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    fn display_command(&self) -> String {
        self.command.join(" ")
    }
}

impl SampleSink for ExternalSink {
    fn log_sample(&self, sample_data: &str) -> Result<(), TelemetryError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or(TelemetryError::EmptyCommand)?;

        let status = Command::new(program)
            .args(args)
            .arg(sample_data)
            .status()
            .map_err(|source| TelemetryError::Spawn {
                command: self.display_command(),
                source,
            })?;

        if status.success() {
            debug!(command = %self.display_command(), "Delivered telemetry sample");
            return Ok(());
        }

        match status.code() {
            Some(code) => Err(TelemetryError::ExitStatus {
                command: self.display_command(),
                code,
            }),
            None => Err(TelemetryError::Signaled {
                command: self.display_command(),
            }),
        }
    }
}

/// Appends each sample as one line to a local file
///
/// Every sample is written with a single append-mode write, so several
/// processes or threads can share the file without tearing lines.
#[derive(Debug, Clone)]
pub struct LocalFileSink {
    path: PathBuf,
}

impl LocalFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SampleSink for LocalFileSink {
    fn log_sample(&self, sample_data: &str) -> Result<(), TelemetryError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| TelemetryError::Open {
                path: self.path.clone(),
                source,
            })?;

        let line = format!("{}\n", sample_data);
        file.write_all(line.as_bytes())
            .map_err(|source| TelemetryError::Write {
                path: self.path.clone(),
                source,
            })?;

        debug!(path = %self.path.display(), "Appended telemetry sample");
        Ok(())
    }
}

/// Accepts samples and drops them
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl SampleSink for NoopSink {
    fn log_sample(&self, _sample_data: &str) -> Result<(), TelemetryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_local_file_appends_lines() {
        let dir = TempDir::new().unwrap();
        let sink = LocalFileSink::new(dir.path().join("telemetry.log"));

        sink.log_sample(r#"{"int":{},"normal":{}}"#).unwrap();
        sink.log_sample(r#"{"int":{"n":1},"normal":{}}"#).unwrap();

        let content = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(
            content,
            "{\"int\":{},\"normal\":{}}\n{\"int\":{\"n\":1},\"normal\":{}}\n"
        );
    }

    #[test]
    fn test_local_file_missing_directory_is_error() {
        let dir = TempDir::new().unwrap();
        let sink = LocalFileSink::new(dir.path().join("missing").join("telemetry.log"));

        let err = sink.log_sample("{}").unwrap_err();
        assert!(matches!(err, TelemetryError::Open { .. }));
    }

    #[test]
    fn test_empty_command_is_error() {
        let sink = ExternalSink::new(Vec::<String>::new());
        assert!(matches!(
            sink.log_sample("{}"),
            Err(TelemetryError::EmptyCommand)
        ));
    }

    #[test]
    fn test_unspawnable_command_is_error() {
        let sink = ExternalSink::new(["/nonexistent/telemetry-logger-binary"]);
        let err = sink.log_sample("{}").unwrap_err();
        assert!(matches!(err, TelemetryError::Spawn { .. }));
        assert!(err.to_string().contains("telemetry-logger-binary"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_receives_sample_as_last_argument() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.txt");
        let script = format!("printf '%s|%s\\n' \"$1\" \"$2\" >> '{}'", out.display());
        let sink = ExternalSink::new(["sh", "-c", script.as_str(), "sh", "category"]);

        sink.log_sample(r#"{"int":{},"normal":{}}"#).unwrap();

        let content = fs::read_to_string(&out).unwrap();
        assert_eq!(content, "category|{\"int\":{},\"normal\":{}}\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_error() {
        let sink = ExternalSink::new(["sh", "-c", "exit 3", "sh"]);
        match sink.log_sample("{}") {
            Err(TelemetryError::ExitStatus { code, .. }) => assert_eq!(code, 3),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_noop_sink_accepts_everything() {
        assert!(NoopSink.log_sample("not even json").is_ok());
    }
}
