//! Numbers backed by an integer or enum datapoint.

use log::debug;

use super::{encode_u32, push_command, Bindings, Commands, InboundDatapoint, OutboundIntent, Tracked};
use crate::{
    error::{ConfigError, IntentError},
    registry::Registry,
    retry::RetryConfig,
    types::{round_u32, DatapointNumber, DatapointType, DatapointValue},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberConfig {
    pub datapoint: DatapointNumber,
    pub datapoint_type: DatapointType,
    pub offset: f32,
    pub multiplier: f32,
    pub retry: RetryConfig,
}

impl NumberConfig {
    pub const fn new(datapoint: DatapointNumber) -> Self {
        Self {
            datapoint,
            datapoint_type: DatapointType::UInt,
            offset: 0.0,
            multiplier: 1.0,
            retry: RetryConfig::disabled(),
        }
    }

    pub const fn with_datapoint_type(mut self, datapoint_type: DatapointType) -> Self {
        self.datapoint_type = datapoint_type;
        self
    }

    pub const fn with_offset(mut self, offset: f32) -> Self {
        self.offset = offset;
        self
    }

    pub const fn with_multiplier(mut self, multiplier: f32) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match self.datapoint_type {
            DatapointType::UInt | DatapointType::Enum | DatapointType::Detect => {}
            other => return Err(ConfigError::UnsupportedType(other)),
        }
        if self.multiplier == 0.0 || self.multiplier.is_nan() {
            return Err(ConfigError::InvalidRange);
        }
        Ok(())
    }

    pub fn raw_to_value(&self, raw: u32) -> f32 {
        raw as f32 * self.multiplier + self.offset
    }

    /// Inverse of [`Self::raw_to_value`], rounded. Values below the datapoint range give zero.
    pub fn value_to_raw(&self, value: f32) -> u32 {
        round_u32((value - self.offset) / self.multiplier)
    }
}

#[derive(Debug)]
pub struct Number {
    config: NumberConfig,
    raw: Tracked<u32>,
}

impl Number {
    pub fn new(config: NumberConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            raw: Tracked::default(),
        })
    }

    pub fn config(&self) -> &NumberConfig {
        &self.config
    }

    pub fn value(&self) -> Option<f32> {
        self.raw.get().map(|raw| self.config.raw_to_value(raw))
    }
}

impl InboundDatapoint for Number {
    fn bindings(&self) -> Bindings {
        let mut bindings = Bindings::new();
        let _ = bindings.push((self.config.datapoint, self.config.datapoint_type));
        bindings
    }

    fn handle_datapoint(&mut self, number: DatapointNumber, value: &DatapointValue) -> bool {
        if number != self.config.datapoint {
            return false;
        }
        value
            .as_u32()
            .is_some_and(|raw| self.raw.confirm(raw))
    }

    fn command_failed(&mut self, number: DatapointNumber) -> bool {
        number == self.config.datapoint && self.raw.revert()
    }
}

impl OutboundIntent for Number {
    type Intent = f32;

    fn handle_intent(
        &mut self,
        value: f32,
        registry: &Registry,
        commands: &mut Commands,
    ) -> Result<(), IntentError> {
        let number = self.config.datapoint;
        let raw = self.config.value_to_raw(value);
        let encoded = encode_u32(registry, number, raw)?;
        debug!("[DP{}] Setting number to {} ({})", number, value, raw);
        push_command(commands, number, encoded, self.raw.retry_for(raw, self.config.retry));
        self.raw.set_desired(raw);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::DatapointError, types::EntityId};

    fn registry_for(number: &Number) -> Registry {
        let mut registry = Registry::new();
        for (datapoint, datapoint_type) in number.bindings() {
            registry.register(datapoint, datapoint_type, EntityId::new(0)).unwrap();
        }
        registry
    }

    #[test]
    fn multiplier_then_offset() {
        let config = NumberConfig::new(10).with_multiplier(0.5).with_offset(-20.0);
        let mut number = Number::new(config).unwrap();
        assert!(number.handle_datapoint(10, &DatapointValue::UInt(50)));
        assert_eq!(number.value(), Some(5.0));
        assert_eq!(config.value_to_raw(5.0), 50);
    }

    #[test]
    fn writes_inverse_value() {
        let config = NumberConfig::new(10).with_multiplier(0.5).with_offset(-20.0);
        let mut number = Number::new(config).unwrap();
        let registry = registry_for(&number);
        let mut commands = Commands::new();

        number.handle_intent(10.0, &registry, &mut commands).unwrap();
        assert_eq!(commands[0].value, DatapointValue::UInt(60));
        assert_eq!(number.value(), Some(10.0));
    }

    #[test]
    fn enum_datapoint_range_is_checked() {
        let config = NumberConfig::new(10).with_datapoint_type(DatapointType::Enum);
        let mut number = Number::new(config).unwrap();
        let registry = registry_for(&number);
        let mut commands = Commands::new();

        assert_eq!(
            number.handle_intent(300.0, &registry, &mut commands),
            Err(IntentError::Datapoint(DatapointError::ValueOutOfRange {
                number: 10,
                datapoint_type: DatapointType::Enum,
            }))
        );
        assert_eq!(number.value(), None);
    }

    #[test]
    fn zero_multiplier_is_rejected() {
        let config = NumberConfig::new(10).with_multiplier(0.0);
        assert_eq!(Number::new(config).unwrap_err(), ConfigError::InvalidRange);
    }
}
