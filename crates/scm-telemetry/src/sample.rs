//! Typed field accumulator for a single telemetry event

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::TelemetryError;

/// Value of a caller-supplied field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Str(String),
    Double(f64),
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl FieldValue {
    /// Convert an untyped JSON value, if it has a supported kind
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(FieldValue::Bool(*b)),
            Value::String(s) => Some(FieldValue::Str(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(FieldValue::Int(i))
                } else if n.is_f64() {
                    n.as_f64().map(FieldValue::Double)
                } else {
                    // u64 beyond i64::MAX
                    None
                }
            }
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Build a list of mixed-type fields for [`TelemetrySample::add_fields`]
///
/// ```
/// use scm_telemetry::fields;
///
/// let fields = fields! { "cached" => true, "files" => 12, "path" => "/repo" };
/// assert_eq!(fields.len(), 3);
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        ::std::vec::Vec::<(&str, $crate::FieldValue)>::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        ::std::vec![$(($name, $crate::FieldValue::from($value))),+]
    };
}

/// Accumulates typed fields for one event until it is committed
///
/// Implementors supply the three typed stores and the delivery step; booleans,
/// bulk fields and the commit protocol are shared.
pub trait TelemetrySample: Sized {
    fn add_int(&mut self, name: &str, value: i64) -> &mut Self;

    fn add_string(&mut self, name: &str, value: &str) -> &mut Self;

    fn add_double(&mut self, name: &str, value: f64) -> &mut Self;

    /// Hand the finished sample to its backend
    fn deliver(self) -> Result<(), TelemetryError>;

    fn add_bool(&mut self, name: &str, value: bool) -> &mut Self {
        self.add_int(name, i64::from(value))
    }

    fn add_field(&mut self, name: &str, value: &FieldValue) -> &mut Self {
        match value {
            FieldValue::Bool(b) => self.add_bool(name, *b),
            FieldValue::Int(i) => self.add_int(name, *i),
            FieldValue::Str(s) => self.add_string(name, s),
            FieldValue::Double(d) => self.add_double(name, *d),
        }
    }

    /// Add every field in iteration order
    fn add_fields<I, K, V>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        for (name, value) in fields {
            self.add_field(name.as_ref(), &value.into());
        }
        self
    }

    /// Add fields from an untyped source, skipping unsupported values
    fn add_json_fields(&mut self, fields: &Map<String, Value>) -> &mut Self {
        for (name, value) in fields {
            match FieldValue::from_json(value) {
                Some(field) => {
                    self.add_field(name, &field);
                }
                None => {
                    warn!(field = %name, value = %value, "unsupported value type passed to add_json_fields()");
                }
            }
        }
        self
    }

    /// Stamp the current time and deliver the sample
    ///
    /// Delivery failures are logged and never reach the caller.
    fn commit(mut self) {
        self.add_int("time", chrono::Utc::now().timestamp());
        if let Err(e) = self.deliver() {
            warn!(error = %e, "error logging telemetry sample");
        }
    }
}

/// Sample that ignores everything, used when telemetry is off
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetrySample;

impl TelemetrySample for NullTelemetrySample {
    fn add_int(&mut self, _name: &str, _value: i64) -> &mut Self {
        self
    }

    fn add_string(&mut self, _name: &str, _value: &str) -> &mut Self {
        self
    }

    fn add_double(&mut self, _name: &str, _value: f64) -> &mut Self {
        self
    }

    fn deliver(self) -> Result<(), TelemetryError> {
        Ok(())
    }

    fn add_fields<I, K, V>(&mut self, _fields: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        self
    }

    fn add_json_fields(&mut self, _fields: &Map<String, Value>) -> &mut Self {
        self
    }

    fn commit(self) {}
}
