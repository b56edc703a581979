//! Entity adapters, translating between entity-level state and datapoints.
//!
//! Every adapter implements [`InboundDatapoint`]; those that accept commands also implement
//! [`OutboundIntent`]. [`Entity`] closes over all adapter kinds.

pub mod climate;
pub mod color;
pub mod fan;
pub mod light;
pub mod number;
pub mod select;
pub mod sensor;
pub mod switch;
pub mod text_sensor;

use alloc::string::String;
use strum_macros::IntoStaticStr;

use crate::{
    error::{DatapointError, IntentError},
    registry::Registry,
    retry::RetryConfig,
    types::{DatapointNumber, DatapointType, DatapointValue, WireType},
};

pub use climate::{
    ActiveStateConfig, Climate, ClimateAction, ClimateConfig, ClimateFanMode, ClimateIntent,
    ClimateMode, ClimatePreset, FanModeConfig, PresetConfig, SwingMode, TemperatureConfig,
};
pub use color::{ColorType, Hsv, Rgb};
pub use fan::{Fan, FanConfig, FanDirection, FanIntent, SpeedConfig};
pub use light::{
    ColorConfig, DimmerConfig, Light, LightConfig, LightIntent, WhiteTemperatureConfig,
};
pub use number::{Number, NumberConfig};
pub use select::{Select, SelectConfig, SelectDatapoint};
pub use sensor::{Sensor, SensorConfig, SensorMode, VapField};
pub use switch::{Switch, SwitchConfig};
pub use text_sensor::{TextSensor, TextSensorConfig, TextSource};

/// Maximum number of commands a single intent may produce.
pub const MAX_COMMANDS: usize = 10;

/// Maximum number of datapoints one entity binds.
pub const MAX_BINDINGS: usize = 12;

/// A datapoint write requested by an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub number: DatapointNumber,
    pub value: DatapointValue,
    pub retry: RetryConfig,
}

pub type Commands = heapless::Vec<Command, MAX_COMMANDS>;

/// Datapoints an entity binds, with the declared type of each.
pub type Bindings = heapless::Vec<(DatapointNumber, DatapointType), MAX_BINDINGS>;

/// Capability of accepting inbound datapoint values.
pub trait InboundDatapoint {
    /// Datapoints to register for this entity.
    fn bindings(&self) -> Bindings;

    /// Apply a confirmed value reported by the MCU. Returns whether entity state changed.
    fn handle_datapoint(&mut self, number: DatapointNumber, value: &DatapointValue) -> bool;

    /// A command for `number` was never acknowledged. Returns whether entity state changed.
    fn command_failed(&mut self, _number: DatapointNumber) -> bool {
        false
    }
}

/// Capability of turning an entity-level intent into datapoint writes.
pub trait OutboundIntent {
    type Intent;

    fn handle_intent(
        &mut self,
        intent: Self::Intent,
        registry: &Registry,
        commands: &mut Commands,
    ) -> Result<(), IntentError>;
}

/// A value the MCU confirmed, plus the value this side wants while a write is in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tracked<T> {
    confirmed: Option<T>,
    desired: Option<T>,
}

impl<T> Default for Tracked<T> {
    fn default() -> Self {
        Self {
            confirmed: None,
            desired: None,
        }
    }
}

impl<T: Copy + PartialEq> Tracked<T> {
    /// The optimistic value if a write is in flight, else the confirmed one.
    pub fn get(&self) -> Option<T> {
        self.desired.or(self.confirmed)
    }

    pub fn confirmed(&self) -> Option<T> {
        self.confirmed
    }

    pub fn is_unconfirmed(&self) -> bool {
        self.desired.is_some()
    }

    pub(crate) fn set_desired(&mut self, value: T) {
        self.desired = Some(value);
    }

    /// Record a reported value and drop any pending wish.
    pub(crate) fn confirm(&mut self, value: T) -> bool {
        let before = self.get();
        self.confirmed = Some(value);
        self.desired = None;
        before != Some(value)
    }

    /// Drop the optimistic value and fall back to the confirmed one.
    pub(crate) fn revert(&mut self) -> bool {
        match self.desired.take() {
            Some(desired) => Some(desired) != self.confirmed,
            None => false,
        }
    }

    /// Retries are only worth it when the value differs from what the MCU last confirmed.
    pub(crate) fn retry_for(&self, value: T, retry: RetryConfig) -> RetryConfig {
        if self.confirmed == Some(value) {
            RetryConfig::disabled()
        } else {
            retry
        }
    }
}

/// Encode a boolean for `number` following its resolved type.
pub(crate) fn encode_bool(
    registry: &Registry,
    number: DatapointNumber,
    value: bool,
) -> Result<DatapointValue, DatapointError> {
    let wire_type = registry.outbound_type(number, WireType::Bool)?;
    DatapointValue::from_bool(wire_type, value).ok_or(DatapointError::ValueOutOfRange {
        number,
        datapoint_type: wire_type.into(),
    })
}

/// Encode an unsigned value for `number` following its resolved type.
pub(crate) fn encode_u32(
    registry: &Registry,
    number: DatapointNumber,
    value: u32,
) -> Result<DatapointValue, DatapointError> {
    let wire_type = registry.outbound_type(number, WireType::UInt)?;
    DatapointValue::from_u32(wire_type, value).ok_or(DatapointError::ValueOutOfRange {
        number,
        datapoint_type: wire_type.into(),
    })
}

pub(crate) fn push_command(
    commands: &mut Commands,
    number: DatapointNumber,
    value: DatapointValue,
    retry: RetryConfig,
) {
    // Adapters never produce more than MAX_COMMANDS writes per intent.
    let _ = commands.push(Command {
        number,
        value,
        retry,
    });
}

/// Kind of an [`Entity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum EntityKind {
    Light,
    Fan,
    Switch,
    Sensor,
    TextSensor,
    Select,
    Number,
    Climate,
}

/// Intent addressed to an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Light(LightIntent),
    Fan(FanIntent),
    Switch(bool),
    /// Select the option with this label.
    Select(String),
    Number(f32),
    Climate(ClimateIntent),
}

/// Every entity kind known to the device runtime.
#[derive(Debug)]
pub enum Entity {
    Light(Light),
    Fan(Fan),
    Switch(Switch),
    Sensor(Sensor),
    TextSensor(TextSensor),
    Select(Select),
    Number(Number),
    Climate(Climate),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Light(_) => EntityKind::Light,
            Self::Fan(_) => EntityKind::Fan,
            Self::Switch(_) => EntityKind::Switch,
            Self::Sensor(_) => EntityKind::Sensor,
            Self::TextSensor(_) => EntityKind::TextSensor,
            Self::Select(_) => EntityKind::Select,
            Self::Number(_) => EntityKind::Number,
            Self::Climate(_) => EntityKind::Climate,
        }
    }

    fn inbound(&self) -> &dyn InboundDatapoint {
        match self {
            Self::Light(entity) => entity,
            Self::Fan(entity) => entity,
            Self::Switch(entity) => entity,
            Self::Sensor(entity) => entity,
            Self::TextSensor(entity) => entity,
            Self::Select(entity) => entity,
            Self::Number(entity) => entity,
            Self::Climate(entity) => entity,
        }
    }

    fn inbound_mut(&mut self) -> &mut dyn InboundDatapoint {
        match self {
            Self::Light(entity) => entity,
            Self::Fan(entity) => entity,
            Self::Switch(entity) => entity,
            Self::Sensor(entity) => entity,
            Self::TextSensor(entity) => entity,
            Self::Select(entity) => entity,
            Self::Number(entity) => entity,
            Self::Climate(entity) => entity,
        }
    }

    pub fn bindings(&self) -> Bindings {
        self.inbound().bindings()
    }

    pub fn handle_datapoint(&mut self, number: DatapointNumber, value: &DatapointValue) -> bool {
        self.inbound_mut().handle_datapoint(number, value)
    }

    pub fn command_failed(&mut self, number: DatapointNumber) -> bool {
        self.inbound_mut().command_failed(number)
    }

    /// Apply an intent. Sensors and text sensors accept none.
    pub fn handle_intent(
        &mut self,
        intent: Intent,
        registry: &Registry,
        commands: &mut Commands,
    ) -> Result<(), IntentError> {
        match (self, intent) {
            (Self::Light(light), Intent::Light(intent)) => {
                light.handle_intent(intent, registry, commands)
            }
            (Self::Fan(fan), Intent::Fan(intent)) => fan.handle_intent(intent, registry, commands),
            (Self::Switch(switch), Intent::Switch(state)) => {
                switch.handle_intent(state, registry, commands)
            }
            (Self::Select(select), Intent::Select(label)) => {
                select.handle_intent(label, registry, commands)
            }
            (Self::Number(number), Intent::Number(value)) => {
                number.handle_intent(value, registry, commands)
            }
            (Self::Climate(climate), Intent::Climate(intent)) => {
                climate.handle_intent(intent, registry, commands)
            }
            _ => Err(IntentError::Unsupported),
        }
    }

    /// Writes to issue once when the device starts.
    pub fn startup_commands(&self, registry: &Registry, commands: &mut Commands) {
        if let Self::Light(light) = self {
            light.startup_commands(registry, commands);
        }
    }

    pub fn as_light(&self) -> Option<&Light> {
        match self {
            Self::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_fan(&self) -> Option<&Fan> {
        match self {
            Self::Fan(fan) => Some(fan),
            _ => None,
        }
    }

    pub fn as_switch(&self) -> Option<&Switch> {
        match self {
            Self::Switch(switch) => Some(switch),
            _ => None,
        }
    }

    pub fn as_sensor(&self) -> Option<&Sensor> {
        match self {
            Self::Sensor(sensor) => Some(sensor),
            _ => None,
        }
    }

    pub fn as_text_sensor(&self) -> Option<&TextSensor> {
        match self {
            Self::TextSensor(sensor) => Some(sensor),
            _ => None,
        }
    }

    pub fn as_select(&self) -> Option<&Select> {
        match self {
            Self::Select(select) => Some(select),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Self::Number(number) => Some(number),
            _ => None,
        }
    }

    pub fn as_climate(&self) -> Option<&Climate> {
        match self {
            Self::Climate(climate) => Some(climate),
            _ => None,
        }
    }
}

macro_rules! impl_from_entity {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Entity {
                fn from(value: $variant) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_entity!(Light, Fan, Switch, Sensor, TextSensor, Select, Number, Climate);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_prefers_desired_until_confirmed() {
        let mut tracked = Tracked::default();
        assert_eq!(tracked.get(), None);

        tracked.set_desired(true);
        assert_eq!(tracked.get(), Some(true));
        assert!(tracked.is_unconfirmed());

        assert!(!tracked.confirm(true));
        assert!(!tracked.is_unconfirmed());
        assert_eq!(tracked.confirmed(), Some(true));
    }

    #[test]
    fn tracked_revert_falls_back() {
        let mut tracked = Tracked::default();
        tracked.confirm(10u32);
        tracked.set_desired(20);
        assert!(tracked.revert());
        assert_eq!(tracked.get(), Some(10));
        assert!(!tracked.revert());
    }

    #[test]
    fn retry_only_for_changes() {
        let retry = RetryConfig::enabled_default();
        let mut tracked = Tracked::default();
        assert!(tracked.retry_for(true, retry).enabled());

        tracked.confirm(true);
        assert!(!tracked.retry_for(true, retry).enabled());
        assert!(tracked.retry_for(false, retry).enabled());
    }

    #[test]
    fn sensors_reject_intents() {
        let mut entity = Entity::from(Sensor::new(SensorConfig::new(1, SensorMode::UInt)).unwrap());
        let registry = Registry::new();
        let mut commands = Commands::new();
        assert_eq!(
            entity.handle_intent(Intent::Switch(true), &registry, &mut commands),
            Err(IntentError::Unsupported)
        );
        assert!(commands.is_empty());
    }
}
