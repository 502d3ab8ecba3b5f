//! # scm-telemetry
//!
//! Structured telemetry samples for source control tooling.
//!
//! A [`TelemetryLogger`] hands out samples for named events. Each sample is
//! prefilled with the identity of the running process (session id, user,
//! host, OS, client version); the caller adds typed fields and commits it,
//! which stamps the time and delivers it to the logger's backend.
//!
//! ## Backends
//!
//! - **External command**: the encoded sample is passed as the last argument
//!   to a fixed command line
//! - **Local file**: the encoded sample is appended to a file as one line
//! - **Null**: everything is discarded
//!
//! ## Failure Model
//!
//! Telemetry never breaks the caller. Identity lookups, field conversion and
//! delivery can all fail; each failure is reported through `tracing` at warn
//! level and the event degrades to partial or no delivery.
//!
//! ## Example
//!
//! ```no_run
//! use scm_telemetry::{fields, ConfiguredLogger, SystemProbe, TelemetryLogger, TelemetrySample};
//!
//! let logger = ConfiguredLogger::load(&SystemProbe::with_version("1.0.0"));
//!
//! logger.log("mount", fields! { "success" => true, "duration" => 1.25 });
//!
//! let mut sample = logger.new_sample("checkout", fields! { "rev" => "abc123" });
//! sample.add_int("files_changed", 42);
//! sample.commit();
//! ```
//!
//! ## Configuration
//!
//! ```toml
//! # ~/.scm/config.toml, .scm/config.toml or .scm/config.local.toml
//! [telemetry]
//! enabled = true
//! log-file = "/tmp/telemetry.log"
//! command = ["scribe_cat", "fs_events"]
//! ```
//!
//! `SCM_TELEMETRY_DISABLED=1` or `DO_NOT_TRACK=1` turn telemetry off.

pub mod config;
pub mod error;
pub mod identity;
pub mod json;
pub mod logger;
pub mod sample;
pub mod session;
pub mod sink;

pub use config::{load_telemetry_config, Backend, TelemetryConfig};
pub use error::TelemetryError;
pub use identity::{Identity, IdentityProbe, SystemProbe};
pub use json::JsonTelemetrySample;
pub use logger::{
    ConfiguredLogger, ConfiguredSample, JsonTelemetryLogger, NullTelemetryLogger, TelemetryLogger,
};
pub use sample::{FieldValue, NullTelemetrySample, TelemetrySample};
pub use session::SessionId;
pub use sink::{ExternalSink, LocalFileSink, NoopSink, SampleSink};

/// Re-export common types
pub type Result<T> = anyhow::Result<T>;
