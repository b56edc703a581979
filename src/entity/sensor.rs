//! Read-only numeric sensors.

use log::warn;
use strum_macros::{EnumIter, IntoStaticStr};

use super::{Bindings, InboundDatapoint};
use crate::{
    error::ConfigError,
    types::{DatapointNumber, DatapointType, DatapointValue},
};

/// Largest decimal scale accepted by [`SensorConfig::with_scale`].
pub const MAX_SCALE: u8 = 6;

const MULTIPLIERS: [f32; MAX_SCALE as usize + 1] =
    [1.0, 0.1, 0.01, 0.001, 0.000_1, 0.000_01, 0.000_001];

/// Field of a voltage/current/power record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum VapField {
    Voltage,
    Current,
    Power,
}

/// Voltage, current and power packed into an 8 byte raw datapoint.
///
/// Each field is a big endian `u16` at offsets 0, 3 and 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VapRecord {
    pub voltage: u32,
    pub current: u32,
    pub power: u32,
}

impl VapRecord {
    pub const LEN: usize = 8;

    pub fn decode(raw: &[u8]) -> Option<Self> {
        let raw: &[u8; Self::LEN] = raw.try_into().ok()?;
        let field = |index: usize| u32::from(u16::from_be_bytes([raw[index], raw[index + 1]]));
        Some(Self {
            voltage: field(0),
            current: field(3),
            power: field(6),
        })
    }

    pub fn get(&self, field: VapField) -> u32 {
        match field {
            VapField::Voltage => self.voltage,
            VapField::Current => self.current,
            VapField::Power => self.power,
        }
    }
}

/// How a sensor reads its datapoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum SensorMode {
    /// Any numeric wire type.
    Any,
    Bool,
    UInt,
    Enum,
    Bitmask,
    /// One field of a raw voltage/current/power record.
    Vap(VapField),
}

impl SensorMode {
    fn datapoint_type(self) -> DatapointType {
        match self {
            Self::Any => DatapointType::Any,
            Self::Bool => DatapointType::Bool,
            Self::UInt => DatapointType::UInt,
            Self::Enum => DatapointType::Enum,
            Self::Bitmask => DatapointType::Bitmask,
            Self::Vap(_) => DatapointType::Raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorConfig {
    pub datapoint: DatapointNumber,
    pub mode: SensorMode,
    /// Added to the raw value before scaling.
    pub offset: i32,
    /// Number of decimal places, the raw value is divided by `10^scale`.
    pub scale: u8,
}

impl SensorConfig {
    pub const fn new(datapoint: DatapointNumber, mode: SensorMode) -> Self {
        Self {
            datapoint,
            mode,
            offset: 0,
            scale: 0,
        }
    }

    pub const fn with_offset(mut self, offset: i32) -> Self {
        self.offset = offset;
        self
    }

    pub const fn with_scale(mut self, scale: u8) -> Self {
        self.scale = scale;
        self
    }

    pub fn multiplier(&self) -> f32 {
        MULTIPLIERS
            .get(usize::from(self.scale))
            .copied()
            .unwrap_or(1.0)
    }

    /// Apply offset and scale to a raw reading.
    pub fn calculate(&self, raw: u32) -> f32 {
        (raw as f32 + self.offset as f32) * self.multiplier()
    }
}

#[derive(Debug)]
pub struct Sensor {
    config: SensorConfig,
    value: Option<f32>,
    vap: Option<VapRecord>,
}

impl Sensor {
    pub fn new(config: SensorConfig) -> Result<Self, ConfigError> {
        if config.scale > MAX_SCALE {
            return Err(ConfigError::InvalidScale);
        }
        Ok(Self {
            config,
            value: None,
            vap: None,
        })
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Last reading with offset and scale applied.
    pub fn value(&self) -> Option<f32> {
        self.value
    }

    /// Last full record, in VAP mode.
    pub fn vap_record(&self) -> Option<VapRecord> {
        self.vap
    }

    fn raw_reading(&mut self, value: &DatapointValue) -> Option<u32> {
        match (self.config.mode, value) {
            (SensorMode::Vap(field), DatapointValue::Raw(raw)) => {
                let Some(record) = VapRecord::decode(raw) else {
                    warn!(
                        "[DP{}] Failed to decode VAP record of {} bytes",
                        self.config.datapoint,
                        raw.len()
                    );
                    return None;
                };
                self.vap = Some(record);
                Some(record.get(field))
            }
            (SensorMode::Vap(_), _) => None,
            (_, value) => value.as_u32(),
        }
    }
}

impl InboundDatapoint for Sensor {
    fn bindings(&self) -> Bindings {
        let mut bindings = Bindings::new();
        let _ = bindings.push((self.config.datapoint, self.config.mode.datapoint_type()));
        bindings
    }

    fn handle_datapoint(&mut self, number: DatapointNumber, value: &DatapointValue) -> bool {
        if number != self.config.datapoint {
            return false;
        }
        let Some(raw) = self.raw_reading(value) else {
            if self.config.mode != SensorMode::Any {
                warn!("[DP{}] Unhandled sensor value {:?}", number, value);
            }
            return false;
        };

        let reading = Some(self.config.calculate(raw));
        let changed = self.value != reading;
        self.value = reading;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn offset_then_scale() {
        let config = SensorConfig::new(7, SensorMode::UInt)
            .with_offset(-5)
            .with_scale(1);
        let mut sensor = Sensor::new(config).unwrap();

        assert!(sensor.handle_datapoint(7, &DatapointValue::UInt(255)));
        assert_eq!(sensor.value(), Some(25.0));
        assert!(!sensor.handle_datapoint(7, &DatapointValue::UInt(255)));
    }

    #[test]
    fn scale_is_bounded() {
        let config = SensorConfig::new(7, SensorMode::UInt).with_scale(7);
        assert_eq!(Sensor::new(config).unwrap_err(), ConfigError::InvalidScale);
        assert_eq!(SensorConfig::new(7, SensorMode::UInt).with_scale(3).multiplier(), 0.001);
    }

    #[test]
    fn any_mode_reads_numeric_types() {
        let mut sensor = Sensor::new(SensorConfig::new(2, SensorMode::Any)).unwrap();
        sensor.handle_datapoint(2, &DatapointValue::Bool(true));
        assert_eq!(sensor.value(), Some(1.0));
        sensor.handle_datapoint(2, &DatapointValue::Bitmask(0x0102));
        assert_eq!(sensor.value(), Some(258.0));

        assert!(!sensor.handle_datapoint(2, &DatapointValue::String("x".into())));
        assert_eq!(sensor.value(), Some(258.0));
    }

    #[test]
    fn vap_publishes_one_field() {
        let raw = vec![0x08, 0xFC, 0x00, 0x00, 0x7B, 0x00, 0x01, 0xC8];
        for field in VapField::iter() {
            let mut sensor = Sensor::new(SensorConfig::new(6, SensorMode::Vap(field))).unwrap();
            assert!(sensor.handle_datapoint(6, &DatapointValue::Raw(raw.clone())));

            let expected = match field {
                VapField::Voltage => 2300.0,
                VapField::Current => 123.0,
                VapField::Power => 456.0,
            };
            assert_eq!(sensor.value(), Some(expected));
            assert_eq!(sensor.vap_record().map(|record| record.get(field)), Some(expected as u32));
        }
    }

    #[test]
    fn vap_rejects_short_records() {
        let mut sensor =
            Sensor::new(SensorConfig::new(6, SensorMode::Vap(VapField::Power))).unwrap();
        assert!(!sensor.handle_datapoint(6, &DatapointValue::Raw(vec![0x00; 7])));
        assert_eq!(sensor.value(), None);
        assert_eq!(
            sensor.bindings().as_slice(),
            &[(6, DatapointType::Raw)]
        );
    }
}
