//! Boolean datapoints, used standalone by [`Switch`] and as a part of lights and fans.

use log::debug;

use super::{encode_bool, push_command, Bindings, Commands, InboundDatapoint, OutboundIntent, Tracked};
use crate::{
    error::{ConfigError, IntentError},
    registry::Registry,
    retry::RetryConfig,
    types::{DatapointNumber, DatapointType, DatapointValue},
};

/// Configuration of a boolean datapoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwitchConfig {
    pub datapoint: DatapointNumber,
    pub datapoint_type: DatapointType,
    pub inverted: bool,
    pub retry: RetryConfig,
}

impl SwitchConfig {
    pub const fn new(datapoint: DatapointNumber) -> Self {
        Self {
            datapoint,
            datapoint_type: DatapointType::Bool,
            inverted: false,
            retry: RetryConfig::disabled(),
        }
    }

    /// One of `Bool`, `UInt`, `Enum` or `Detect`.
    pub const fn with_datapoint_type(mut self, datapoint_type: DatapointType) -> Self {
        self.datapoint_type = datapoint_type;
        self
    }

    pub const fn with_inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match self.datapoint_type {
            DatapointType::Bool | DatapointType::UInt | DatapointType::Enum | DatapointType::Detect => {
                Ok(())
            }
            other => Err(ConfigError::UnsupportedType(other)),
        }
    }
}

/// A boolean datapoint with its tracked logical state.
#[derive(Debug, Clone)]
pub(crate) struct BoolDatapoint {
    config: SwitchConfig,
    state: Tracked<bool>,
}

impl BoolDatapoint {
    pub(crate) fn new(config: SwitchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            state: Tracked::default(),
        })
    }

    pub(crate) fn number(&self) -> DatapointNumber {
        self.config.datapoint
    }

    pub(crate) fn config(&self) -> &SwitchConfig {
        &self.config
    }

    pub(crate) fn state(&self) -> &Tracked<bool> {
        &self.state
    }

    pub(crate) fn bind(&self, bindings: &mut Bindings) {
        let _ = bindings.push((self.config.datapoint, self.config.datapoint_type));
    }

    /// Apply a reported value. Returns `None` if the datapoint is not this one or not boolean.
    pub(crate) fn on_value(&mut self, number: DatapointNumber, value: &DatapointValue) -> Option<bool> {
        if number != self.config.datapoint {
            return None;
        }
        let raw = value.as_bool()?;
        Some(self.state.confirm(raw != self.config.inverted))
    }

    /// Queue a write of the logical `state`.
    pub(crate) fn write(
        &mut self,
        state: bool,
        registry: &Registry,
        commands: &mut Commands,
    ) -> Result<(), IntentError> {
        let number = self.config.datapoint;
        let value = encode_bool(registry, number, state != self.config.inverted)?;
        let retry = self.state.retry_for(state, self.config.retry);
        debug!("[DP{}] Setting switch to {}", number, state);
        push_command(commands, number, value, retry);
        self.state.set_desired(state);
        Ok(())
    }

    pub(crate) fn failed(&mut self, number: DatapointNumber) -> bool {
        number == self.config.datapoint && self.state.revert()
    }
}

/// A switch entity over one boolean datapoint.
#[derive(Debug, Clone)]
pub struct Switch {
    datapoint: BoolDatapoint,
}

impl Switch {
    pub fn new(config: SwitchConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            datapoint: BoolDatapoint::new(config)?,
        })
    }

    pub fn config(&self) -> &SwitchConfig {
        self.datapoint.config()
    }

    /// Current state, optimistic while a write is unconfirmed.
    pub fn state(&self) -> Option<bool> {
        self.datapoint.state().get()
    }

    /// State last reported by the MCU.
    pub fn confirmed_state(&self) -> Option<bool> {
        self.datapoint.state().confirmed()
    }
}

impl InboundDatapoint for Switch {
    fn bindings(&self) -> Bindings {
        let mut bindings = Bindings::new();
        self.datapoint.bind(&mut bindings);
        bindings
    }

    fn handle_datapoint(&mut self, number: DatapointNumber, value: &DatapointValue) -> bool {
        self.datapoint.on_value(number, value).unwrap_or(false)
    }

    fn command_failed(&mut self, number: DatapointNumber) -> bool {
        self.datapoint.failed(number)
    }
}

impl OutboundIntent for Switch {
    type Intent = bool;

    fn handle_intent(
        &mut self,
        intent: bool,
        registry: &Registry,
        commands: &mut Commands,
    ) -> Result<(), IntentError> {
        self.datapoint.write(intent, registry, commands)
    }
}
