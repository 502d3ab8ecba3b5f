//! JSON-encoded samples
//!
//! A sample is written as one JSON object:
//!
//! ```json
//! {"int": {"session_id": 12, "time": 1700000000}, "normal": {"type": "mount"}, "double": {"ratio": 0.5}}
//! ```
//!
//! `int` and `normal` are always present, even when empty. `double` only
//! appears when at least one double field was added; downstream parsers rely on
//! exactly this shape.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::TelemetryError;
use crate::sample::TelemetrySample;
use crate::sink::SampleSink;

#[derive(Debug, Clone, Default, Serialize)]
struct Payload {
    #[serde(rename = "int")]
    ints: BTreeMap<String, i64>,
    #[serde(rename = "normal")]
    strings: BTreeMap<String, String>,
    #[serde(rename = "double", skip_serializing_if = "BTreeMap::is_empty")]
    doubles: BTreeMap<String, f64>,
}

/// Sample that encodes itself as JSON and hands the text to a sink
pub struct JsonTelemetrySample {
    payload: Payload,
    sink: Arc<dyn SampleSink>,
    debug: bool,
}

impl JsonTelemetrySample {
    pub fn new(sink: Arc<dyn SampleSink>) -> Self {
        Self {
            payload: Payload::default(),
            sink,
            debug: false,
        }
    }

    /// Echo the encoded sample to stderr before delivering it
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn get_json(&self) -> Result<String, TelemetryError> {
        Ok(serde_json::to_string(&self.payload)?)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.payload.ints.get(name).copied()
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.payload.strings.get(name).map(String::as_str)
    }

    pub fn double(&self, name: &str) -> Option<f64> {
        self.payload.doubles.get(name).copied()
    }

    fn print_debug(&self) {
        eprintln!("Telemetry sample (debug mode):");
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&self.payload).unwrap_or_default()
        );
    }
}

impl fmt::Debug for JsonTelemetrySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonTelemetrySample")
            .field("payload", &self.payload)
            .field("sink", &self.sink)
            .field("debug", &self.debug)
            .finish()
    }
}

impl TelemetrySample for JsonTelemetrySample {
    fn add_int(&mut self, name: &str, value: i64) -> &mut Self {
        self.payload.ints.insert(name.to_string(), value);
        self
    }

    fn add_string(&mut self, name: &str, value: &str) -> &mut Self {
        self.payload.strings.insert(name.to_string(), value.to_string());
        self
    }

    fn add_double(&mut self, name: &str, value: f64) -> &mut Self {
        self.payload.doubles.insert(name.to_string(), value);
        self
    }

    fn deliver(self) -> Result<(), TelemetryError> {
        if self.debug {
            self.print_debug();
        }
        let data = self.get_json()?;
        self.sink.log_sample(&data)
    }
}
