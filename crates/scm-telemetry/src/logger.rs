//! Loggers that enrich samples with identity and route them to a backend

use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use crate::config::{load_telemetry_config, Backend, TelemetryConfig};
use crate::error::TelemetryError;
use crate::identity::{Identity, IdentityProbe};
use crate::json::JsonTelemetrySample;
use crate::sample::{FieldValue, NullTelemetrySample, TelemetrySample};
use crate::sink::{ExternalSink, LocalFileSink, NoopSink, SampleSink};

/// Produces identity-stamped samples for one backend
///
/// Backends only say how to create an empty sample. Identity enrichment and
/// the one-shot [`log`](TelemetryLogger::log) are shared.
pub trait TelemetryLogger {
    type Sample: TelemetrySample;

    fn identity(&self) -> &Identity;

    fn create_sample(&self) -> Self::Sample;

    /// Start a sample for `event_type`, prefilled with identity and `fields`
    fn new_sample<I, K, V>(&self, event_type: &str, fields: I) -> Self::Sample
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        let identity = self.identity();
        let mut sample = self.create_sample();
        sample
            .add_string("type", event_type)
            .add_int("session_id", i64::from(identity.session_id.get()))
            .add_string("user", &identity.user)
            .add_string("host", &identity.hostname)
            .add_string("os", &identity.os)
            .add_string("osver", &identity.os_version)
            .add_string("edenver", &identity.client_version)
            .add_fields(fields);
        sample
    }

    /// Build and commit a sample in one call
    fn log<I, K, V>(&self, event_type: &str, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        self.new_sample(event_type, fields).commit();
    }

    /// Like [`log`](TelemetryLogger::log), for fields from an untyped source
    fn log_json(&self, event_type: &str, fields: &Map<String, Value>) {
        let mut sample = self.new_sample(event_type, Vec::<(&str, FieldValue)>::new());
        sample.add_json_fields(fields);
        sample.commit();
    }
}

/// Logger whose samples are encoded as JSON and passed to a sink
#[derive(Debug, Clone)]
pub struct JsonTelemetryLogger {
    identity: Identity,
    sink: Arc<dyn SampleSink>,
    debug: bool,
}

impl JsonTelemetryLogger {
    pub fn new(identity: Identity, sink: Arc<dyn SampleSink>) -> Self {
        Self {
            identity,
            sink,
            debug: false,
        }
    }

    /// Logger that runs `command` with each sample appended as an argument
    pub fn external<I, S>(identity: Identity, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(identity, Arc::new(ExternalSink::new(command)))
    }

    /// Logger that appends each sample to `path`, one JSON object per line
    pub fn local(identity: Identity, path: impl Into<PathBuf>) -> Self {
        Self::new(identity, Arc::new(LocalFileSink::new(path)))
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn sink(&self) -> &dyn SampleSink {
        self.sink.as_ref()
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }
}

impl TelemetryLogger for JsonTelemetryLogger {
    type Sample = JsonTelemetrySample;

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn create_sample(&self) -> JsonTelemetrySample {
        JsonTelemetrySample::new(Arc::clone(&self.sink)).with_debug(self.debug)
    }
}

/// Logger that discards all samples
#[derive(Debug, Clone)]
pub struct NullTelemetryLogger {
    identity: Identity,
}

impl NullTelemetryLogger {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }
}

impl TelemetryLogger for NullTelemetryLogger {
    type Sample = NullTelemetrySample;

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn create_sample(&self) -> NullTelemetrySample {
        NullTelemetrySample
    }
}

/// Logger chosen at runtime from [`TelemetryConfig`]
#[derive(Debug, Clone)]
pub enum ConfiguredLogger {
    Json(JsonTelemetryLogger),
    Null(NullTelemetryLogger),
}

impl ConfiguredLogger {
    /// Build the backend `config` selects
    pub fn from_config(config: &TelemetryConfig, identity: Identity) -> Self {
        let logger = match config.backend() {
            Backend::LocalFile(path) => JsonTelemetryLogger::local(identity, path),
            Backend::External(command) => JsonTelemetryLogger::external(identity, command),
            // Debug mode prints samples even when nothing would deliver them
            Backend::Discard if config.debug => {
                JsonTelemetryLogger::new(identity, Arc::new(NoopSink))
            }
            Backend::Discard => return Self::Null(NullTelemetryLogger::new(identity)),
        };
        Self::Json(logger.with_debug(config.debug))
    }

    /// Load configuration and build the selected logger
    ///
    /// Never fails: a configuration error is logged and telemetry is disabled.
    pub fn load<P>(probe: &P) -> Self
    where
        P: IdentityProbe + ?Sized,
    {
        let config = load_telemetry_config().unwrap_or_else(|e| {
            let error = format!("{:#}", e);
            warn!(error = %error, "error loading telemetry configuration");
            TelemetryConfig::disabled()
        });
        Self::from_config(&config, Identity::current(probe))
    }

    /// Whether samples reach a real backend
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}

impl TelemetryLogger for ConfiguredLogger {
    type Sample = ConfiguredSample;

    fn identity(&self) -> &Identity {
        match self {
            Self::Json(logger) => logger.identity(),
            Self::Null(logger) => logger.identity(),
        }
    }

    fn create_sample(&self) -> ConfiguredSample {
        match self {
            Self::Json(logger) => ConfiguredSample::Json(logger.create_sample()),
            Self::Null(logger) => ConfiguredSample::Null(logger.create_sample()),
        }
    }
}

/// Sample produced by a [`ConfiguredLogger`]
#[derive(Debug)]
pub enum ConfiguredSample {
    Json(JsonTelemetrySample),
    Null(NullTelemetrySample),
}

impl TelemetrySample for ConfiguredSample {
    fn add_int(&mut self, name: &str, value: i64) -> &mut Self {
        match self {
            Self::Json(sample) => {
                sample.add_int(name, value);
            }
            Self::Null(sample) => {
                sample.add_int(name, value);
            }
        }
        self
    }

    fn add_string(&mut self, name: &str, value: &str) -> &mut Self {
        match self {
            Self::Json(sample) => {
                sample.add_string(name, value);
            }
            Self::Null(sample) => {
                sample.add_string(name, value);
            }
        }
        self
    }

    fn add_double(&mut self, name: &str, value: f64) -> &mut Self {
        match self {
            Self::Json(sample) => {
                sample.add_double(name, value);
            }
            Self::Null(sample) => {
                sample.add_double(name, value);
            }
        }
        self
    }

    fn deliver(self) -> Result<(), TelemetryError> {
        match self {
            Self::Json(sample) => sample.deliver(),
            Self::Null(sample) => sample.deliver(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;
    use crate::identity::tests::{BrokenProbe, FixedProbe};
    use crate::session::SessionId;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn identity() -> Identity {
        Identity::collect(SessionId::from_raw(42), &FixedProbe)
    }

    fn read_records(path: &std::path::Path) -> Vec<Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_new_sample_is_enriched() {
        let dir = TempDir::new().unwrap();
        let logger = JsonTelemetryLogger::local(identity(), dir.path().join("t.log"));

        let sample = logger.new_sample("mount", fields! { "cold" => true });

        assert_eq!(sample.string("type"), Some("mount"));
        assert_eq!(sample.int("session_id"), Some(42));
        assert_eq!(sample.string("user"), Some("alice"));
        assert_eq!(sample.string("host"), Some(""));
        assert_eq!(sample.string("os"), Some("Linux"));
        assert_eq!(sample.string("osver"), Some("6.1.0"));
        assert_eq!(sample.string("edenver"), Some("20240101-abcdef"));
        assert_eq!(sample.int("cold"), Some(1));
        assert_eq!(sample.int("time"), None);
    }

    #[test]
    fn test_caller_fields_override_identity() {
        let dir = TempDir::new().unwrap();
        let logger = JsonTelemetryLogger::local(identity(), dir.path().join("t.log"));

        let sample = logger.new_sample("mount", fields! { "user" => "bob" });
        assert_eq!(sample.string("user"), Some("bob"));
    }

    #[test]
    fn test_log_writes_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.log");
        let logger = JsonTelemetryLogger::local(identity(), &path);

        logger.log("checkout", fields! { "files" => 12, "duration" => 0.5 });

        let records = read_records(&path);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record["normal"]["type"], json!("checkout"));
        assert_eq!(record["int"]["files"], json!(12));
        assert_eq!(record["int"]["session_id"], json!(42));
        assert_eq!(record["double"]["duration"], json!(0.5));
        assert!(record["int"]["time"].is_i64());
    }

    #[test]
    fn test_log_json_skips_unsupported_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.log");
        let logger = JsonTelemetryLogger::local(identity(), &path);

        let extra = json!({"reason": "timeout", "paths": ["a", "b"]});
        logger.log_json("fetch", extra.as_object().unwrap());

        let records = read_records(&path);
        assert_eq!(records[0]["normal"]["reason"], json!("timeout"));
        assert!(records[0]["normal"].get("paths").is_none());
        assert!(records[0].get("double").is_none());
    }

    #[test]
    fn test_broken_identity_still_logs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.log");
        let logger = JsonTelemetryLogger::local(
            Identity::collect(SessionId::from_raw(5), &BrokenProbe),
            &path,
        );

        logger.log("unmount", fields! {});

        let records = read_records(&path);
        assert_eq!(records[0]["normal"]["user"], json!(""));
        assert_eq!(records[0]["normal"]["edenver"], json!(""));
    }

    #[test]
    fn test_unwritable_file_does_not_fail() {
        let dir = TempDir::new().unwrap();
        let logger =
            JsonTelemetryLogger::local(identity(), dir.path().join("no/such/dir/t.log"));
        logger.log("mount", fields! {});
    }

    #[test]
    fn test_unspawnable_command_does_not_fail() {
        let logger = JsonTelemetryLogger::external(identity(), ["/nonexistent/scribe_cat"]);
        logger.log("mount", fields! { "ok" => false });
    }

    #[test]
    fn test_null_logger_keeps_identity() {
        let logger = NullTelemetryLogger::new(identity());
        assert_eq!(logger.identity().user, "alice");
        logger.log("mount", fields! { "a" => 1 });
    }

    #[test]
    fn test_configured_logger_selects_backend() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.log");

        let config = TelemetryConfig {
            log_file: Some(path.clone()),
            ..TelemetryConfig::default()
        };
        let logger = ConfiguredLogger::from_config(&config, identity());
        assert!(logger.is_enabled());
        logger.log("mount", fields! { "n" => 1 });
        assert_eq!(read_records(&path).len(), 1);

        let logger = ConfiguredLogger::from_config(&TelemetryConfig::disabled(), identity());
        assert!(!logger.is_enabled());
        assert_eq!(logger.identity().session_id.get(), 42);
        logger.log("mount", fields! { "n" => 1 });
        assert_eq!(read_records(&path).len(), 1);
    }

    #[test]
    fn test_debug_without_backend_uses_noop_sink() {
        let config = TelemetryConfig {
            enabled: false,
            debug: true,
            ..TelemetryConfig::default()
        };
        match ConfiguredLogger::from_config(&config, identity()) {
            ConfiguredLogger::Json(logger) => assert!(logger.is_debug()),
            ConfiguredLogger::Null(_) => panic!("debug mode should keep a JSON logger"),
        }
    }
}
