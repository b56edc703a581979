//! Selects mapping datapoint values to option labels.

use alloc::{string::String, vec::Vec};
use log::{debug, warn};

use super::{encode_u32, push_command, Bindings, Commands, InboundDatapoint, OutboundIntent, Tracked};
use crate::{
    error::{ConfigError, IntentError},
    registry::Registry,
    retry::RetryConfig,
    types::{DatapointNumber, DatapointType, DatapointValue},
};

/// The datapoint behind a select, either an enum or an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectDatapoint {
    Enum(DatapointNumber),
    Int(DatapointNumber),
}

impl SelectDatapoint {
    pub fn number(self) -> DatapointNumber {
        match self {
            Self::Enum(number) | Self::Int(number) => number,
        }
    }

    fn datapoint_type(self) -> DatapointType {
        match self {
            Self::Enum(_) => DatapointType::Enum,
            Self::Int(_) => DatapointType::UInt,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectConfig {
    pub datapoint: SelectDatapoint,
    /// Datapoint value and label of every option.
    pub options: Vec<(u8, String)>,
    /// Publish a selection before the MCU confirms it.
    pub optimistic: bool,
    pub retry: RetryConfig,
}

impl SelectConfig {
    pub fn new(datapoint: SelectDatapoint) -> Self {
        Self {
            datapoint,
            options: Vec::new(),
            optimistic: false,
            retry: RetryConfig::disabled(),
        }
    }

    pub fn with_option(mut self, value: u8, label: impl Into<String>) -> Self {
        self.options.push((value, label.into()));
        self
    }

    pub fn with_optimistic(mut self, optimistic: bool) -> Self {
        self.optimistic = optimistic;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Check the mapping is a bijection between values and labels.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.options.is_empty() {
            return Err(ConfigError::EmptyMapping);
        }
        for (index, (value, label)) in self.options.iter().enumerate() {
            let earlier = &self.options[..index];
            if earlier.iter().any(|(other, _)| other == value) {
                return Err(ConfigError::DuplicateOption(*value));
            }
            if earlier.iter().any(|(_, other)| other == label) {
                return Err(ConfigError::DuplicateLabel(*value));
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Select {
    config: SelectConfig,
    value: Tracked<u8>,
}

impl Select {
    pub fn new(config: SelectConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            value: Tracked::default(),
        })
    }

    pub fn config(&self) -> &SelectConfig {
        &self.config
    }

    pub fn options(&self) -> impl Iterator<Item = &str> {
        self.config.options.iter().map(|(_, label)| label.as_str())
    }

    /// Label of the current option.
    pub fn option(&self) -> Option<&str> {
        let value = self.value.get()?;
        self.label_of(value)
    }

    /// Datapoint value of the current option.
    pub fn value(&self) -> Option<u8> {
        self.value.get()
    }

    fn label_of(&self, value: u8) -> Option<&str> {
        self.config
            .options
            .iter()
            .find(|(option, _)| *option == value)
            .map(|(_, label)| label.as_str())
    }

    fn value_of(&self, label: &str) -> Option<u8> {
        self.config
            .options
            .iter()
            .find(|(_, option)| option == label)
            .map(|(value, _)| *value)
    }
}

impl InboundDatapoint for Select {
    fn bindings(&self) -> Bindings {
        let mut bindings = Bindings::new();
        let datapoint = self.config.datapoint;
        let _ = bindings.push((datapoint.number(), datapoint.datapoint_type()));
        bindings
    }

    fn handle_datapoint(&mut self, number: DatapointNumber, value: &DatapointValue) -> bool {
        if number != self.config.datapoint.number() {
            return false;
        }
        let Some(value) = value.as_u32().and_then(|value| u8::try_from(value).ok()) else {
            warn!("[DP{}] Unhandled select value {:?}", number, value);
            return false;
        };
        if self.label_of(value).is_none() {
            warn!("[DP{}] Unknown select option {}", number, value);
            return false;
        }
        self.value.confirm(value)
    }

    fn command_failed(&mut self, number: DatapointNumber) -> bool {
        number == self.config.datapoint.number() && self.value.revert()
    }
}

impl OutboundIntent for Select {
    type Intent = String;

    fn handle_intent(
        &mut self,
        label: String,
        registry: &Registry,
        commands: &mut Commands,
    ) -> Result<(), IntentError> {
        let Some(value) = self.value_of(&label) else {
            return Err(IntentError::UnknownOption(label));
        };
        let number = self.config.datapoint.number();
        let encoded = encode_u32(registry, number, u32::from(value))?;
        debug!("[DP{}] Selecting {} ({})", number, label, value);
        push_command(
            commands,
            number,
            encoded,
            self.value.retry_for(value, self.config.retry),
        );
        if self.config.optimistic {
            self.value.set_desired(value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityId;

    fn speeds(datapoint: SelectDatapoint) -> SelectConfig {
        SelectConfig::new(datapoint)
            .with_option(0, "Low")
            .with_option(1, "Med")
            .with_option(2, "High")
    }

    fn registry_for(select: &Select) -> Registry {
        let mut registry = Registry::new();
        for (number, datapoint_type) in select.bindings() {
            registry.register(number, datapoint_type, EntityId::new(0)).unwrap();
        }
        registry
    }

    #[test]
    fn unknown_index_is_ignored() {
        let mut select = Select::new(speeds(SelectDatapoint::Enum(4))).unwrap();
        assert!(select.handle_datapoint(4, &DatapointValue::Enum(1)));
        assert_eq!(select.option(), Some("Med"));

        assert!(!select.handle_datapoint(4, &DatapointValue::Enum(5)));
        assert_eq!(select.option(), Some("Med"));
    }

    #[test]
    fn mapping_must_be_bijective() {
        let config = speeds(SelectDatapoint::Enum(4)).with_option(1, "Turbo");
        assert_eq!(Select::new(config).unwrap_err(), ConfigError::DuplicateOption(1));

        let config = speeds(SelectDatapoint::Enum(4)).with_option(3, "Low");
        assert_eq!(Select::new(config).unwrap_err(), ConfigError::DuplicateLabel(3));

        let config = SelectConfig::new(SelectDatapoint::Int(4));
        assert_eq!(Select::new(config).unwrap_err(), ConfigError::EmptyMapping);
    }

    #[test]
    fn int_datapoint_writes_uint() {
        let mut select = Select::new(speeds(SelectDatapoint::Int(4))).unwrap();
        let registry = registry_for(&select);
        let mut commands = Commands::new();

        select
            .handle_intent("High".into(), &registry, &mut commands)
            .unwrap();
        assert_eq!(commands[0].value, DatapointValue::UInt(2));
        // Not optimistic, so the state waits for the report.
        assert_eq!(select.option(), None);
    }

    #[test]
    fn optimistic_select_publishes_immediately() {
        let config = speeds(SelectDatapoint::Enum(4)).with_optimistic(true);
        let mut select = Select::new(config).unwrap();
        let registry = registry_for(&select);
        let mut commands = Commands::new();

        select
            .handle_intent("Low".into(), &registry, &mut commands)
            .unwrap();
        assert_eq!(commands[0].value, DatapointValue::Enum(0));
        assert_eq!(select.option(), Some("Low"));
        assert!(select.command_failed(4));
        assert_eq!(select.option(), None);
    }

    #[test]
    fn unknown_label_is_rejected() {
        let mut select = Select::new(speeds(SelectDatapoint::Enum(4))).unwrap();
        let registry = registry_for(&select);
        let mut commands = Commands::new();
        assert_eq!(
            select.handle_intent("Max".into(), &registry, &mut commands),
            Err(IntentError::UnknownOption("Max".into()))
        );
        assert_eq!(select.options().collect::<Vec<_>>(), vec!["Low", "Med", "High"]);
    }
}
