//! Fans with optional speed, switch, oscillation and direction datapoints.

use log::debug;
use strum_macros::{EnumIter, IntoStaticStr};

use super::{
    encode_u32, push_command,
    switch::{BoolDatapoint, SwitchConfig},
    Bindings, Commands, InboundDatapoint, OutboundIntent, Tracked,
};
use crate::{
    error::{ConfigError, IntentError},
    registry::Registry,
    retry::RetryConfig,
    types::{DatapointNumber, DatapointType, DatapointValue},
};

/// Speed datapoint of a fan.
///
/// Speed levels `0..levels` are spread linearly over `min_value..=max_value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedConfig {
    pub datapoint: DatapointNumber,
    pub datapoint_type: DatapointType,
    pub min_value: u32,
    pub max_value: u32,
    /// Number of speed levels, `max_value - min_value + 1` unless set.
    pub levels: Option<u32>,
    pub retry: RetryConfig,
}

impl SpeedConfig {
    pub const fn new(datapoint: DatapointNumber, min_value: u32, max_value: u32) -> Self {
        Self {
            datapoint,
            datapoint_type: DatapointType::UInt,
            min_value,
            max_value,
            levels: None,
            retry: RetryConfig::disabled(),
        }
    }

    pub const fn with_datapoint_type(mut self, datapoint_type: DatapointType) -> Self {
        self.datapoint_type = datapoint_type;
        self
    }

    pub const fn with_levels(mut self, levels: u32) -> Self {
        self.levels = Some(levels);
        self
    }

    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.datapoint_type {
            DatapointType::UInt | DatapointType::Enum | DatapointType::Detect => {}
            other => return Err(ConfigError::UnsupportedType(other)),
        }
        if self.min_value > self.max_value || self.levels == Some(0) {
            return Err(ConfigError::InvalidRange);
        }
        Ok(())
    }

    pub fn level_count(&self) -> u32 {
        self.levels
            .unwrap_or_else(|| self.max_value.saturating_sub(self.min_value).saturating_add(1))
    }

    /// Raw datapoint value of a speed level, rounded to the nearest step.
    pub fn level_to_raw(&self, level: u32) -> u32 {
        let steps = u64::from(self.level_count().saturating_sub(1));
        if steps == 0 {
            return self.min_value;
        }
        let level = u64::from(level).min(steps);
        let span = u64::from(self.max_value - self.min_value);
        let offset = (level * span + steps / 2) / steps;
        self.min_value + offset as u32
    }

    /// Speed level of a raw datapoint value, clamped to the configured range.
    pub fn raw_to_level(&self, raw: u32) -> u32 {
        let steps = u64::from(self.level_count().saturating_sub(1));
        let span = u64::from(self.max_value - self.min_value);
        if steps == 0 || span == 0 {
            return 0;
        }
        let offset = u64::from(raw.clamp(self.min_value, self.max_value) - self.min_value);
        ((offset * steps + span / 2) / span) as u32
    }

    /// Speed level for a percentage in `1..=100`. Zero maps to the lowest level.
    pub fn percent_to_level(&self, percent: u8) -> u32 {
        let levels = self.level_count();
        let percent = u32::from(percent.min(100));
        (percent * levels).div_ceil(100).saturating_sub(1)
    }

    pub fn level_to_percent(&self, level: u32) -> u8 {
        let levels = self.level_count();
        let level = level.min(levels.saturating_sub(1));
        ((level + 1) * 100 / levels) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum FanDirection {
    Forward,
    /// Reported as `true` by the direction datapoint.
    Reverse,
}

impl From<bool> for FanDirection {
    fn from(value: bool) -> Self {
        if value { Self::Reverse } else { Self::Forward }
    }
}

impl From<FanDirection> for bool {
    fn from(value: FanDirection) -> Self {
        value == FanDirection::Reverse
    }
}

/// Configuration of a [`Fan`]. At least a speed or a switch datapoint is required.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FanConfig {
    pub speed: Option<SpeedConfig>,
    pub switch: Option<SwitchConfig>,
    pub oscillation: Option<SwitchConfig>,
    pub direction: Option<SwitchConfig>,
}

impl FanConfig {
    pub const fn new() -> Self {
        Self {
            speed: None,
            switch: None,
            oscillation: None,
            direction: None,
        }
    }

    pub const fn with_speed(mut self, speed: SpeedConfig) -> Self {
        self.speed = Some(speed);
        self
    }

    pub const fn with_switch(mut self, switch: SwitchConfig) -> Self {
        self.switch = Some(switch);
        self
    }

    pub const fn with_oscillation(mut self, oscillation: SwitchConfig) -> Self {
        self.oscillation = Some(oscillation);
        self
    }

    pub const fn with_direction(mut self, direction: SwitchConfig) -> Self {
        self.direction = Some(direction);
        self
    }
}

/// A requested fan change. Unset fields are left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FanIntent {
    pub state: Option<bool>,
    /// Speed level, takes precedence over `percentage`.
    pub speed: Option<u32>,
    pub percentage: Option<u8>,
    pub oscillating: Option<bool>,
    pub direction: Option<FanDirection>,
}

impl FanIntent {
    pub const fn new() -> Self {
        Self {
            state: None,
            speed: None,
            percentage: None,
            oscillating: None,
            direction: None,
        }
    }

    pub const fn with_state(mut self, state: bool) -> Self {
        self.state = Some(state);
        self
    }

    pub const fn with_speed(mut self, level: u32) -> Self {
        self.speed = Some(level);
        self
    }

    pub const fn with_percentage(mut self, percentage: u8) -> Self {
        self.percentage = Some(percentage);
        self
    }

    pub const fn with_oscillating(mut self, oscillating: bool) -> Self {
        self.oscillating = Some(oscillating);
        self
    }

    pub const fn with_direction(mut self, direction: FanDirection) -> Self {
        self.direction = Some(direction);
        self
    }
}

#[derive(Debug)]
pub struct Fan {
    speed_config: Option<SpeedConfig>,
    speed: Tracked<u32>,
    switch: Option<BoolDatapoint>,
    oscillation: Option<BoolDatapoint>,
    direction: Option<BoolDatapoint>,
}

impl Fan {
    pub fn new(config: FanConfig) -> Result<Self, ConfigError> {
        if config.speed.is_none() && config.switch.is_none() {
            return Err(ConfigError::MissingDatapoint);
        }
        if let Some(speed) = &config.speed {
            speed.validate()?;
        }

        Ok(Self {
            speed_config: config.speed,
            speed: Tracked::default(),
            switch: config.switch.map(BoolDatapoint::new).transpose()?,
            oscillation: config.oscillation.map(BoolDatapoint::new).transpose()?,
            direction: config.direction.map(BoolDatapoint::new).transpose()?,
        })
    }

    pub fn speed_config(&self) -> Option<&SpeedConfig> {
        self.speed_config.as_ref()
    }

    /// Whether the fan runs. Without a switch, a known speed counts as running.
    pub fn is_on(&self) -> Option<bool> {
        match &self.switch {
            Some(switch) => switch.state().get(),
            None => self.speed.get().map(|_| true),
        }
    }

    /// Current speed level.
    pub fn speed(&self) -> Option<u32> {
        let config = self.speed_config.as_ref()?;
        self.speed.get().map(|raw| config.raw_to_level(raw))
    }

    pub fn percentage(&self) -> Option<u8> {
        let config = self.speed_config.as_ref()?;
        self.speed()
            .map(|level| config.level_to_percent(level))
    }

    pub fn is_oscillating(&self) -> Option<bool> {
        self.oscillation.as_ref()?.state().get()
    }

    pub fn direction(&self) -> Option<FanDirection> {
        self.direction
            .as_ref()?
            .state()
            .get()
            .map(FanDirection::from)
    }

    fn parts_mut(&mut self) -> impl Iterator<Item = &mut BoolDatapoint> {
        self.switch
            .iter_mut()
            .chain(self.oscillation.iter_mut())
            .chain(self.direction.iter_mut())
    }
}

impl InboundDatapoint for Fan {
    fn bindings(&self) -> Bindings {
        let mut bindings = Bindings::new();
        if let Some(speed) = &self.speed_config {
            let _ = bindings.push((speed.datapoint, speed.datapoint_type));
        }
        for part in [&self.switch, &self.oscillation, &self.direction]
            .into_iter()
            .flatten()
        {
            part.bind(&mut bindings);
        }
        bindings
    }

    fn handle_datapoint(&mut self, number: DatapointNumber, value: &DatapointValue) -> bool {
        let mut changed = false;
        if let Some(speed) = &self.speed_config
            && speed.datapoint == number
            && let Some(raw) = value.as_u32()
        {
            changed |= self.speed.confirm(raw);
        }
        for part in self.parts_mut() {
            changed |= part.on_value(number, value).unwrap_or(false);
        }
        changed
    }

    fn command_failed(&mut self, number: DatapointNumber) -> bool {
        let mut changed = false;
        if self.speed_config.is_some_and(|speed| speed.datapoint == number) {
            changed |= self.speed.revert();
        }
        for part in self.parts_mut() {
            changed |= part.failed(number);
        }
        changed
    }
}

impl OutboundIntent for Fan {
    type Intent = FanIntent;

    fn handle_intent(
        &mut self,
        intent: FanIntent,
        registry: &Registry,
        commands: &mut Commands,
    ) -> Result<(), IntentError> {
        if let Some(state) = intent.state {
            match &mut self.switch {
                Some(switch) => switch.write(state, registry, commands)?,
                None if !state => return Err(IntentError::Unsupported),
                None => {}
            }
        }
        if let Some(oscillating) = intent.oscillating {
            let part = self.oscillation.as_mut().ok_or(IntentError::Unsupported)?;
            part.write(oscillating, registry, commands)?;
        }
        if let Some(direction) = intent.direction {
            let part = self.direction.as_mut().ok_or(IntentError::Unsupported)?;
            part.write(direction.into(), registry, commands)?;
        }

        let Some(config) = &self.speed_config else {
            return match intent.speed.or(intent.percentage.map(u32::from)) {
                Some(_) => Err(IntentError::Unsupported),
                None => Ok(()),
            };
        };
        let level = intent
            .speed
            .or_else(|| intent.percentage.map(|percent| config.percent_to_level(percent)));
        if let Some(level) = level {
            let raw = config.level_to_raw(level);
            let value = encode_u32(registry, config.datapoint, raw)?;
            debug!("[DP{}] Setting fan speed level {} ({})", config.datapoint, level, raw);
            push_command(
                commands,
                config.datapoint,
                value,
                self.speed.retry_for(raw, config.retry),
            );
            self.speed.set_desired(raw);
        }
        Ok(())
    }
}
