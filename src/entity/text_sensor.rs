//! Read-only text sensors over string or raw datapoints.

use alloc::{format, string::String, vec::Vec};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::warn;
use strum_macros::IntoStaticStr;

use super::{Bindings, InboundDatapoint};
use crate::types::{DatapointNumber, DatapointType, DatapointValue};

/// Wire type a text sensor reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoStaticStr)]
pub enum TextSource {
    #[default]
    String,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSensorConfig {
    pub datapoint: DatapointNumber,
    pub source: TextSource,
    /// The payload is base64 encoded.
    pub base64_encoded: bool,
    /// Publish the payload bytes as `AA.BB.CC (3)`.
    pub as_hex: bool,
}

impl TextSensorConfig {
    pub const fn new(datapoint: DatapointNumber, source: TextSource) -> Self {
        Self {
            datapoint,
            source,
            base64_encoded: false,
            as_hex: false,
        }
    }

    pub const fn with_base64(mut self, base64_encoded: bool) -> Self {
        self.base64_encoded = base64_encoded;
        self
    }

    pub const fn with_hex(mut self, as_hex: bool) -> Self {
        self.as_hex = as_hex;
        self
    }

    /// Render a payload the way this sensor publishes it.
    ///
    /// A payload that is not valid base64 renders as an empty string.
    pub fn render(&self, payload: &[u8]) -> String {
        if payload.is_empty() {
            return String::new();
        }
        let decoded: Vec<u8>;
        let bytes = if self.base64_encoded {
            decoded = match STANDARD.decode(payload) {
                Ok(decoded) => decoded,
                Err(err) => {
                    warn!("[DP{}] Invalid base64 payload: {}", self.datapoint, err);
                    return String::new();
                }
            };
            decoded.as_slice()
        } else {
            payload
        };

        if self.as_hex {
            format_hex_pretty(bytes)
        } else {
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Format bytes as upper case hex pairs separated by dots, followed by the byte count.
pub fn format_hex_pretty(data: &[u8]) -> String {
    if data.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = data.iter().map(|byte| hex::encode_upper([*byte])).collect();
    format!("{} ({})", pairs.join("."), data.len())
}

#[derive(Debug)]
pub struct TextSensor {
    config: TextSensorConfig,
    value: Option<String>,
}

impl TextSensor {
    pub fn new(config: TextSensorConfig) -> Self {
        Self {
            config,
            value: None,
        }
    }

    pub fn config(&self) -> &TextSensorConfig {
        &self.config
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl InboundDatapoint for TextSensor {
    fn bindings(&self) -> Bindings {
        let datapoint_type = match self.config.source {
            TextSource::String => DatapointType::String,
            TextSource::Raw => DatapointType::Raw,
        };
        let mut bindings = Bindings::new();
        let _ = bindings.push((self.config.datapoint, datapoint_type));
        bindings
    }

    fn handle_datapoint(&mut self, number: DatapointNumber, value: &DatapointValue) -> bool {
        if number != self.config.datapoint {
            return false;
        }
        let Some(payload) = value.as_bytes() else {
            warn!("[DP{}] Unhandled text value {:?}", number, value);
            return false;
        };

        let text = self.config.render(payload);
        let changed = self.value.as_deref() != Some(text.as_str());
        self.value = Some(text);
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_pretty_format() {
        assert_eq!(format_hex_pretty(&[0xAA, 0xBB, 0x0C]), "AA.BB.0C (3)");
        assert_eq!(format_hex_pretty(&[]), "");
    }

    #[test]
    fn plain_string_passes_through() {
        let mut sensor = TextSensor::new(TextSensorConfig::new(9, TextSource::String));
        assert!(sensor.handle_datapoint(9, &DatapointValue::String("v1.2.3".into())));
        assert_eq!(sensor.value(), Some("v1.2.3"));
        assert!(!sensor.handle_datapoint(9, &DatapointValue::String("v1.2.3".into())));
    }

    #[test]
    fn base64_then_hex() {
        let config = TextSensorConfig::new(9, TextSource::Raw)
            .with_base64(true)
            .with_hex(true);
        let mut sensor = TextSensor::new(config);
        sensor.handle_datapoint(9, &DatapointValue::Raw(b"qrvM".to_vec()));
        assert_eq!(sensor.value(), Some("AA.BB.CC (3)"));
    }

    #[test]
    fn invalid_base64_renders_empty() {
        let config = TextSensorConfig::new(9, TextSource::String).with_base64(true);
        assert_eq!(config.render(b"not base64!"), "");
        assert_eq!(config.render(b"aGVsbG8="), "hello");
    }

    #[test]
    fn raw_bytes_as_hex() {
        let config = TextSensorConfig::new(9, TextSource::Raw).with_hex(true);
        let mut sensor = TextSensor::new(config);
        sensor.handle_datapoint(9, &DatapointValue::Raw(vec![0x01, 0xFF]));
        assert_eq!(sensor.value(), Some("01.FF (2)"));
        assert_eq!(sensor.bindings().as_slice(), &[(9, DatapointType::Raw)]);
    }

    #[test]
    fn numeric_values_are_ignored() {
        let mut sensor = TextSensor::new(TextSensorConfig::new(9, TextSource::String));
        assert!(!sensor.handle_datapoint(9, &DatapointValue::UInt(1)));
        assert_eq!(sensor.value(), None);
    }
}
