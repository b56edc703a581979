//! Climate devices such as thermostats and air conditioners.
//!
//! A climate entity is composed of optional parts: a power switch, an active state datapoint
//! carrying the running mode, target and current temperatures, boost/eco/sleep presets, swing
//! axes and a fan mode. Mode and action are derived from whatever parts are present.

use log::{debug, warn};
use strum_macros::{EnumIter, IntoStaticStr};

use super::{
    encode_u32,
    number::NumberConfig,
    push_command,
    switch::{BoolDatapoint, SwitchConfig},
    Bindings, Commands, InboundDatapoint, OutboundIntent, Tracked,
};
use crate::{
    error::{ConfigError, IntentError},
    registry::Registry,
    retry::RetryConfig,
    types::{DatapointNumber, DatapointType, DatapointValue},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum ClimateMode {
    Off,
    /// Powered, heating or cooling as needed.
    HeatCool,
    Heat,
    Cool,
    Dry,
    FanOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum ClimateAction {
    Off,
    Idle,
    Heating,
    Cooling,
    Drying,
    Fan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum ClimatePreset {
    /// No preset active, the manual target temperature applies.
    Manual,
    Boost,
    Eco,
    Sleep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum SwingMode {
    Off,
    Both,
    Vertical,
    Horizontal,
}

impl SwingMode {
    /// Vertical and horizontal swing state.
    pub const fn axes(self) -> (bool, bool) {
        match self {
            Self::Off => (false, false),
            Self::Both => (true, true),
            Self::Vertical => (true, false),
            Self::Horizontal => (false, true),
        }
    }

    pub const fn from_axes(vertical: bool, horizontal: bool) -> Self {
        match (vertical, horizontal) {
            (false, false) => Self::Off,
            (true, true) => Self::Both,
            (true, false) => Self::Vertical,
            (false, true) => Self::Horizontal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum ClimateFanMode {
    Auto,
    Low,
    Medium,
    Middle,
    High,
}

/// Datapoint reporting which mode the device is running in.
///
/// Each mode maps to one raw datapoint value. Unmapped modes cannot be selected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveStateConfig {
    pub datapoint: DatapointNumber,
    pub datapoint_type: DatapointType,
    pub heating: Option<u32>,
    pub cooling: Option<u32>,
    pub drying: Option<u32>,
    pub fan_only: Option<u32>,
    pub retry: RetryConfig,
}

impl ActiveStateConfig {
    pub const fn new(datapoint: DatapointNumber) -> Self {
        Self {
            datapoint,
            datapoint_type: DatapointType::Enum,
            heating: None,
            cooling: None,
            drying: None,
            fan_only: None,
            retry: RetryConfig::disabled(),
        }
    }

    pub const fn with_datapoint_type(mut self, datapoint_type: DatapointType) -> Self {
        self.datapoint_type = datapoint_type;
        self
    }

    pub const fn with_heating(mut self, value: u32) -> Self {
        self.heating = Some(value);
        self
    }

    pub const fn with_cooling(mut self, value: u32) -> Self {
        self.cooling = Some(value);
        self
    }

    pub const fn with_drying(mut self, value: u32) -> Self {
        self.drying = Some(value);
        self
    }

    pub const fn with_fan_only(mut self, value: u32) -> Self {
        self.fan_only = Some(value);
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
        if self.mappings().iter().all(|(_, value)| value.is_none()) {
            return Err(ConfigError::EmptyMapping);
        }
        Ok(())
    }

    fn mappings(&self) -> [(ClimateMode, Option<u32>); 4] {
        [
            (ClimateMode::Heat, self.heating),
            (ClimateMode::Cool, self.cooling),
            (ClimateMode::Dry, self.drying),
            (ClimateMode::FanOnly, self.fan_only),
        ]
    }

    pub fn mode_of(&self, raw: u32) -> Option<ClimateMode> {
        self.mappings()
            .into_iter()
            .find(|(_, value)| *value == Some(raw))
            .map(|(mode, _)| mode)
    }

    pub fn action_of(&self, raw: u32) -> Option<ClimateAction> {
        self.mode_of(raw).map(|mode| match mode {
            ClimateMode::Heat => ClimateAction::Heating,
            ClimateMode::Cool => ClimateAction::Cooling,
            ClimateMode::Dry => ClimateAction::Drying,
            _ => ClimateAction::Fan,
        })
    }

    pub fn value_of(&self, mode: ClimateMode) -> Option<u32> {
        self.mappings()
            .into_iter()
            .find(|(mapped, _)| *mapped == mode)
            .and_then(|(_, value)| value)
    }
}

/// Target and optional current temperature datapoints.
///
/// Temperatures are exposed in degrees Celsius. With `reports_fahrenheit` the datapoints carry
/// Fahrenheit and are converted on the way in and out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureConfig {
    pub target: NumberConfig,
    pub current: Option<NumberConfig>,
    /// Allowed deviation from the target before heating or cooling is assumed.
    pub hysteresis: f32,
    pub reports_fahrenheit: bool,
}

impl TemperatureConfig {
    pub const fn new(target: NumberConfig) -> Self {
        Self {
            target,
            current: None,
            hysteresis: 1.0,
            reports_fahrenheit: false,
        }
    }

    pub const fn with_current(mut self, current: NumberConfig) -> Self {
        self.current = Some(current);
        self
    }

    pub const fn with_hysteresis(mut self, hysteresis: f32) -> Self {
        self.hysteresis = hysteresis;
        self
    }

    pub const fn with_reports_fahrenheit(mut self, reports_fahrenheit: bool) -> Self {
        self.reports_fahrenheit = reports_fahrenheit;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.target.validate()?;
        if let Some(current) = &self.current {
            current.validate()?;
        }
        if self.hysteresis.is_nan() || self.hysteresis < 0.0 {
            return Err(ConfigError::InvalidRange);
        }
        Ok(())
    }

    fn reported_to_celsius(&self, value: f32) -> f32 {
        if self.reports_fahrenheit {
            (value - 32.0) * 5.0 / 9.0
        } else {
            value
        }
    }

    fn celsius_to_reported(&self, value: f32) -> f32 {
        if self.reports_fahrenheit {
            value * 9.0 / 5.0 + 32.0
        } else {
            value
        }
    }
}

/// A preset toggled by a boolean datapoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetConfig {
    pub switch: SwitchConfig,
    /// Target temperature shown while the preset is active.
    pub temperature: Option<f32>,
}

impl PresetConfig {
    pub const fn new(switch: SwitchConfig) -> Self {
        Self {
            switch,
            temperature: None,
        }
    }

    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Datapoint selecting the fan mode through a value per mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FanModeConfig {
    pub datapoint: DatapointNumber,
    pub datapoint_type: DatapointType,
    values: [Option<u32>; 5],
    pub retry: RetryConfig,
}

impl FanModeConfig {
    pub const fn new(datapoint: DatapointNumber) -> Self {
        Self {
            datapoint,
            datapoint_type: DatapointType::Enum,
            values: [None; 5],
            retry: RetryConfig::disabled(),
        }
    }

    pub const fn with_datapoint_type(mut self, datapoint_type: DatapointType) -> Self {
        self.datapoint_type = datapoint_type;
        self
    }

    pub const fn with_mode(mut self, mode: ClimateFanMode, value: u32) -> Self {
        self.values[mode as usize] = Some(value);
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
        if self.values.iter().all(Option::is_none) {
            return Err(ConfigError::EmptyMapping);
        }
        Ok(())
    }

    pub fn value_of(&self, mode: ClimateFanMode) -> Option<u32> {
        self.values[mode as usize]
    }

    /// Fan mode of a reported value. Auto wins over the speeds when values are shared.
    pub fn mode_of(&self, raw: u32) -> Option<ClimateFanMode> {
        [
            ClimateFanMode::Auto,
            ClimateFanMode::High,
            ClimateFanMode::Medium,
            ClimateFanMode::Middle,
            ClimateFanMode::Low,
        ]
        .into_iter()
        .find(|mode| self.value_of(*mode) == Some(raw))
    }
}

/// Configuration of a [`Climate`]. A switch, an active state or temperatures are required.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateConfig {
    pub switch: Option<SwitchConfig>,
    pub supports_heat: bool,
    pub supports_cool: bool,
    pub active_state: Option<ActiveStateConfig>,
    pub temperatures: Option<TemperatureConfig>,
    pub boost: Option<PresetConfig>,
    pub eco: Option<PresetConfig>,
    pub sleep: Option<PresetConfig>,
    pub swing_vertical: Option<SwitchConfig>,
    pub swing_horizontal: Option<SwitchConfig>,
    pub fan_mode: Option<FanModeConfig>,
}

/// Heating only, no parts.
impl Default for ClimateConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClimateConfig {
    pub const fn new() -> Self {
        Self {
            switch: None,
            supports_heat: true,
            supports_cool: false,
            active_state: None,
            temperatures: None,
            boost: None,
            eco: None,
            sleep: None,
            swing_vertical: None,
            swing_horizontal: None,
            fan_mode: None,
        }
    }

    pub const fn with_switch(mut self, switch: SwitchConfig) -> Self {
        self.switch = Some(switch);
        self
    }

    pub const fn with_supported_modes(mut self, heat: bool, cool: bool) -> Self {
        self.supports_heat = heat;
        self.supports_cool = cool;
        self
    }

    pub const fn with_active_state(mut self, active_state: ActiveStateConfig) -> Self {
        self.active_state = Some(active_state);
        self
    }

    pub const fn with_temperatures(mut self, temperatures: TemperatureConfig) -> Self {
        self.temperatures = Some(temperatures);
        self
    }

    pub const fn with_boost(mut self, boost: PresetConfig) -> Self {
        self.boost = Some(boost);
        self
    }

    pub const fn with_eco(mut self, eco: PresetConfig) -> Self {
        self.eco = Some(eco);
        self
    }

    pub const fn with_sleep(mut self, sleep: PresetConfig) -> Self {
        self.sleep = Some(sleep);
        self
    }

    pub const fn with_swing_vertical(mut self, swing: SwitchConfig) -> Self {
        self.swing_vertical = Some(swing);
        self
    }

    pub const fn with_swing_horizontal(mut self, swing: SwitchConfig) -> Self {
        self.swing_horizontal = Some(swing);
        self
    }

    pub const fn with_fan_mode(mut self, fan_mode: FanModeConfig) -> Self {
        self.fan_mode = Some(fan_mode);
        self
    }
}

/// A requested climate change. Unset fields are left alone.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClimateIntent {
    pub mode: Option<ClimateMode>,
    /// Degrees Celsius.
    pub target_temperature: Option<f32>,
    pub preset: Option<ClimatePreset>,
    pub swing: Option<SwingMode>,
    pub fan_mode: Option<ClimateFanMode>,
}

impl ClimateIntent {
    pub const fn new() -> Self {
        Self {
            mode: None,
            target_temperature: None,
            preset: None,
            swing: None,
            fan_mode: None,
        }
    }

    pub const fn with_mode(mut self, mode: ClimateMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub const fn with_target_temperature(mut self, celsius: f32) -> Self {
        self.target_temperature = Some(celsius);
        self
    }

    pub const fn with_preset(mut self, preset: ClimatePreset) -> Self {
        self.preset = Some(preset);
        self
    }

    pub const fn with_swing(mut self, swing: SwingMode) -> Self {
        self.swing = Some(swing);
        self
    }

    pub const fn with_fan_mode(mut self, fan_mode: ClimateFanMode) -> Self {
        self.fan_mode = Some(fan_mode);
        self
    }
}

#[derive(Debug)]
pub struct Climate {
    config: ClimateConfig,
    switch: Option<BoolDatapoint>,
    active_state: Tracked<u32>,
    target: Tracked<u32>,
    current: Option<u32>,
    boost: Option<BoolDatapoint>,
    eco: Option<BoolDatapoint>,
    sleep: Option<BoolDatapoint>,
    swing_vertical: Option<BoolDatapoint>,
    swing_horizontal: Option<BoolDatapoint>,
    fan_mode: Tracked<u32>,
}

impl Climate {
    pub fn new(config: ClimateConfig) -> Result<Self, ConfigError> {
        if config.switch.is_none() && config.active_state.is_none() && config.temperatures.is_none()
        {
            return Err(ConfigError::MissingDatapoint);
        }
        if let Some(active_state) = &config.active_state {
            active_state.validate()?;
        }
        if let Some(temperatures) = &config.temperatures {
            temperatures.validate()?;
        }
        if let Some(fan_mode) = &config.fan_mode {
            fan_mode.validate()?;
        }
        let part = |switch: Option<SwitchConfig>| switch.map(BoolDatapoint::new).transpose();

        Ok(Self {
            config,
            switch: part(config.switch)?,
            active_state: Tracked::default(),
            target: Tracked::default(),
            current: None,
            boost: part(config.boost.map(|preset| preset.switch))?,
            eco: part(config.eco.map(|preset| preset.switch))?,
            sleep: part(config.sleep.map(|preset| preset.switch))?,
            swing_vertical: part(config.swing_vertical)?,
            swing_horizontal: part(config.swing_horizontal)?,
            fan_mode: Tracked::default(),
        })
    }

    pub fn config(&self) -> &ClimateConfig {
        &self.config
    }

    /// Whether the device is powered. Devices without a switch are always on.
    pub fn is_on(&self) -> Option<bool> {
        match &self.switch {
            Some(switch) => switch.state().get(),
            None => Some(true),
        }
    }

    pub fn mode(&self) -> Option<ClimateMode> {
        if !self.is_on()? {
            return Some(ClimateMode::Off);
        }
        match &self.config.active_state {
            Some(active_state) => {
                if let Some(mode) = self.active_state.get().and_then(|raw| active_state.mode_of(raw))
                {
                    return Some(mode);
                }
            }
            None => match self.temperature_action() {
                Some(ClimateAction::Heating) => return Some(ClimateMode::Heat),
                Some(ClimateAction::Cooling) => return Some(ClimateMode::Cool),
                _ => {}
            },
        }
        Some(match (self.config.supports_heat, self.config.supports_cool) {
            (true, false) => ClimateMode::Heat,
            (false, true) => ClimateMode::Cool,
            _ => ClimateMode::HeatCool,
        })
    }

    /// What the device is doing right now.
    pub fn action(&self) -> ClimateAction {
        if matches!(self.mode(), None | Some(ClimateMode::Off)) {
            return ClimateAction::Off;
        }
        match &self.config.active_state {
            Some(active_state) => self
                .active_state
                .get()
                .and_then(|raw| active_state.action_of(raw))
                .unwrap_or(ClimateAction::Idle),
            None => self.temperature_action().unwrap_or(ClimateAction::Off),
        }
    }

    /// Action derived from the temperature difference, `None` while a temperature is unknown.
    fn temperature_action(&self) -> Option<ClimateAction> {
        let temperatures = self.config.temperatures.as_ref()?;
        let difference = self.target_temperature()? - self.current_temperature()?;
        if self.config.supports_heat && difference > temperatures.hysteresis {
            Some(ClimateAction::Heating)
        } else if self.config.supports_cool && difference < -temperatures.hysteresis {
            Some(ClimateAction::Cooling)
        } else {
            Some(ClimateAction::Idle)
        }
    }

    /// Target temperature in degrees Celsius. An active preset with a temperature takes precedence.
    pub fn target_temperature(&self) -> Option<f32> {
        let preset_temperature = match self.preset() {
            ClimatePreset::Boost => self.config.boost.and_then(|preset| preset.temperature),
            ClimatePreset::Eco => self.config.eco.and_then(|preset| preset.temperature),
            ClimatePreset::Sleep => self.config.sleep.and_then(|preset| preset.temperature),
            ClimatePreset::Manual => None,
        };
        preset_temperature.or_else(|| {
            let temperatures = self.config.temperatures.as_ref()?;
            self.target
                .get()
                .map(|raw| temperatures.reported_to_celsius(temperatures.target.raw_to_value(raw)))
        })
    }

    /// Current temperature in degrees Celsius.
    pub fn current_temperature(&self) -> Option<f32> {
        let temperatures = self.config.temperatures.as_ref()?;
        let current = temperatures.current.as_ref()?;
        self.current
            .map(|raw| temperatures.reported_to_celsius(current.raw_to_value(raw)))
    }

    /// Active preset. Boost wins over eco, eco over sleep.
    pub fn preset(&self) -> ClimatePreset {
        let active = |part: &Option<BoolDatapoint>| {
            part.as_ref()
                .is_some_and(|part| part.state().get().unwrap_or(false))
        };
        if active(&self.boost) {
            ClimatePreset::Boost
        } else if active(&self.eco) {
            ClimatePreset::Eco
        } else if active(&self.sleep) {
            ClimatePreset::Sleep
        } else {
            ClimatePreset::Manual
        }
    }

    pub fn swing_mode(&self) -> Option<SwingMode> {
        if self.swing_vertical.is_none() && self.swing_horizontal.is_none() {
            return None;
        }
        let state = |part: &Option<BoolDatapoint>| {
            part.as_ref()
                .and_then(|part| part.state().get())
                .unwrap_or(false)
        };
        Some(SwingMode::from_axes(
            state(&self.swing_vertical),
            state(&self.swing_horizontal),
        ))
    }

    pub fn fan_mode(&self) -> Option<ClimateFanMode> {
        let config = self.config.fan_mode.as_ref()?;
        self.fan_mode.get().and_then(|raw| config.mode_of(raw))
    }

    /// Whether any part has a write in flight.
    pub fn is_unconfirmed(&self) -> bool {
        self.bool_parts()
            .any(|part| part.state().is_unconfirmed())
            || self.active_state.is_unconfirmed()
            || self.target.is_unconfirmed()
            || self.fan_mode.is_unconfirmed()
    }

    fn bool_parts(&self) -> impl Iterator<Item = &BoolDatapoint> {
        [
            &self.switch,
            &self.boost,
            &self.eco,
            &self.sleep,
            &self.swing_vertical,
            &self.swing_horizontal,
        ]
        .into_iter()
        .flatten()
    }

    fn bool_parts_mut(&mut self) -> impl Iterator<Item = &mut BoolDatapoint> {
        [
            &mut self.switch,
            &mut self.boost,
            &mut self.eco,
            &mut self.sleep,
            &mut self.swing_vertical,
            &mut self.swing_horizontal,
        ]
        .into_iter()
        .flatten()
    }

    fn write_mode(
        &mut self,
        mode: ClimateMode,
        registry: &Registry,
        commands: &mut Commands,
    ) -> Result<(), IntentError> {
        let on = mode != ClimateMode::Off;
        match &mut self.switch {
            Some(switch) => switch.write(on, registry, commands)?,
            None if !on => return Err(IntentError::Unsupported),
            None => {}
        }
        if !on || mode == ClimateMode::HeatCool {
            return Ok(());
        }

        let Some((active_state, raw)) = self
            .config
            .active_state
            .and_then(|active_state| Some((active_state, active_state.value_of(mode)?)))
        else {
            if self.switch.is_none() {
                return Err(IntentError::Unsupported);
            }
            warn!("Mode {} has no active state value", <&'static str>::from(mode));
            return Ok(());
        };
        let value = encode_u32(registry, active_state.datapoint, raw)?;
        debug!("[DP{}] Setting active state to {}", active_state.datapoint, raw);
        push_command(
            commands,
            active_state.datapoint,
            value,
            self.active_state.retry_for(raw, active_state.retry),
        );
        self.active_state.set_desired(raw);
        Ok(())
    }

    fn write_swing(
        &mut self,
        swing: SwingMode,
        registry: &Registry,
        commands: &mut Commands,
    ) -> Result<(), IntentError> {
        if self.swing_vertical.is_none() && self.swing_horizontal.is_none() {
            return Err(IntentError::Unsupported);
        }
        let (vertical, horizontal) = swing.axes();
        for (part, state) in [
            (&mut self.swing_vertical, vertical),
            (&mut self.swing_horizontal, horizontal),
        ] {
            if let Some(part) = part
                && part.state().get() != Some(state)
            {
                part.write(state, registry, commands)?;
            }
        }
        Ok(())
    }

    fn write_fan_mode(
        &mut self,
        mode: ClimateFanMode,
        registry: &Registry,
        commands: &mut Commands,
    ) -> Result<(), IntentError> {
        let config = self.config.fan_mode.ok_or(IntentError::Unsupported)?;
        let raw = config.value_of(mode).ok_or(IntentError::Unsupported)?;
        let value = encode_u32(registry, config.datapoint, raw)?;
        debug!("[DP{}] Setting fan mode to {}", config.datapoint, raw);
        push_command(
            commands,
            config.datapoint,
            value,
            self.fan_mode.retry_for(raw, config.retry),
        );
        self.fan_mode.set_desired(raw);
        Ok(())
    }

    fn write_target_temperature(
        &mut self,
        celsius: f32,
        registry: &Registry,
        commands: &mut Commands,
    ) -> Result<(), IntentError> {
        let temperatures = self.config.temperatures.ok_or(IntentError::Unsupported)?;
        let target = temperatures.target;
        let raw = target.value_to_raw(temperatures.celsius_to_reported(celsius));
        let value = encode_u32(registry, target.datapoint, raw)?;
        debug!("[DP{}] Setting target temperature to {}", target.datapoint, raw);
        push_command(
            commands,
            target.datapoint,
            value,
            self.target.retry_for(raw, target.retry),
        );
        self.target.set_desired(raw);
        Ok(())
    }

    fn write_preset(
        &mut self,
        preset: ClimatePreset,
        registry: &Registry,
        commands: &mut Commands,
    ) -> Result<(), IntentError> {
        let requested = match preset {
            ClimatePreset::Manual => self.boost.is_some() || self.eco.is_some() || self.sleep.is_some(),
            ClimatePreset::Boost => self.boost.is_some(),
            ClimatePreset::Eco => self.eco.is_some(),
            ClimatePreset::Sleep => self.sleep.is_some(),
        };
        if !requested {
            return Err(IntentError::Unsupported);
        }
        for (kind, part) in [
            (ClimatePreset::Boost, &mut self.boost),
            (ClimatePreset::Eco, &mut self.eco),
            (ClimatePreset::Sleep, &mut self.sleep),
        ] {
            if let Some(part) = part {
                part.write(preset == kind, registry, commands)?;
            }
        }
        Ok(())
    }
}

impl InboundDatapoint for Climate {
    fn bindings(&self) -> Bindings {
        let mut bindings = Bindings::new();
        for part in self.bool_parts() {
            part.bind(&mut bindings);
        }
        if let Some(active_state) = &self.config.active_state {
            let _ = bindings.push((active_state.datapoint, active_state.datapoint_type));
        }
        if let Some(temperatures) = &self.config.temperatures {
            let _ = bindings.push((temperatures.target.datapoint, temperatures.target.datapoint_type));
            if let Some(current) = &temperatures.current {
                let _ = bindings.push((current.datapoint, current.datapoint_type));
            }
        }
        if let Some(fan_mode) = &self.config.fan_mode {
            let _ = bindings.push((fan_mode.datapoint, fan_mode.datapoint_type));
        }
        bindings
    }

    fn handle_datapoint(&mut self, number: DatapointNumber, value: &DatapointValue) -> bool {
        let mut changed = false;
        for part in self.bool_parts_mut() {
            changed |= part.on_value(number, value).unwrap_or(false);
        }
        let Some(raw) = value.as_u32() else {
            return changed;
        };

        if let Some(active_state) = &self.config.active_state
            && active_state.datapoint == number
        {
            if active_state.mode_of(raw).is_none() {
                warn!("[DP{}] Unmapped active state {}", number, raw);
            }
            changed |= self.active_state.confirm(raw);
        }
        if let Some(temperatures) = &self.config.temperatures {
            if temperatures.target.datapoint == number {
                changed |= self.target.confirm(raw);
            }
            if temperatures
                .current
                .is_some_and(|current| current.datapoint == number)
                && self.current != Some(raw)
            {
                self.current = Some(raw);
                changed = true;
            }
        }
        if let Some(fan_mode) = &self.config.fan_mode
            && fan_mode.datapoint == number
        {
            changed |= self.fan_mode.confirm(raw);
        }
        changed
    }

    fn command_failed(&mut self, number: DatapointNumber) -> bool {
        let mut changed = false;
        for part in self.bool_parts_mut() {
            changed |= part.failed(number);
        }
        if self
            .config
            .active_state
            .is_some_and(|active_state| active_state.datapoint == number)
        {
            changed |= self.active_state.revert();
        }
        if self
            .config
            .temperatures
            .is_some_and(|temperatures| temperatures.target.datapoint == number)
        {
            changed |= self.target.revert();
        }
        if self
            .config
            .fan_mode
            .is_some_and(|fan_mode| fan_mode.datapoint == number)
        {
            changed |= self.fan_mode.revert();
        }
        changed
    }
}

impl OutboundIntent for Climate {
    type Intent = ClimateIntent;

    fn handle_intent(
        &mut self,
        intent: ClimateIntent,
        registry: &Registry,
        commands: &mut Commands,
    ) -> Result<(), IntentError> {
        if let Some(mode) = intent.mode {
            self.write_mode(mode, registry, commands)?;
        }
        if let Some(swing) = intent.swing {
            self.write_swing(swing, registry, commands)?;
        }
        if let Some(fan_mode) = intent.fan_mode {
            self.write_fan_mode(fan_mode, registry, commands)?;
        }
        if let Some(celsius) = intent.target_temperature {
            self.write_target_temperature(celsius, registry, commands)?;
        }
        if let Some(preset) = intent.preset {
            self.write_preset(preset, registry, commands)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityId;

    fn registry_for(climate: &Climate) -> Registry {
        let mut registry = Registry::new();
        for (number, datapoint_type) in climate.bindings() {
            registry.register(number, datapoint_type, EntityId::new(0)).unwrap();
        }
        registry
    }

    fn thermostat() -> Climate {
        Climate::new(
            ClimateConfig::new()
                .with_switch(SwitchConfig::new(1))
                .with_temperatures(
                    TemperatureConfig::new(NumberConfig::new(2).with_multiplier(0.5))
                        .with_current(NumberConfig::new(3).with_multiplier(0.5)),
                )
                .with_eco(PresetConfig::new(SwitchConfig::new(4)).with_temperature(18.0))
                .with_boost(PresetConfig::new(SwitchConfig::new(5))),
        )
        .unwrap()
    }

    fn air_conditioner() -> Climate {
        Climate::new(
            ClimateConfig::new()
                .with_switch(SwitchConfig::new(1))
                .with_supported_modes(true, true)
                .with_active_state(
                    ActiveStateConfig::new(4)
                        .with_heating(1)
                        .with_cooling(0)
                        .with_drying(3),
                )
                .with_swing_vertical(SwitchConfig::new(6))
                .with_swing_horizontal(SwitchConfig::new(7))
                .with_fan_mode(
                    FanModeConfig::new(5)
                        .with_mode(ClimateFanMode::Low, 1)
                        .with_mode(ClimateFanMode::Medium, 2)
                        .with_mode(ClimateFanMode::High, 3)
                        .with_mode(ClimateFanMode::Auto, 0),
                ),
        )
        .unwrap()
    }

    #[test]
    fn rejects_bad_configs() {
        assert_eq!(
            Climate::new(ClimateConfig::new()).unwrap_err(),
            ConfigError::MissingDatapoint
        );
        assert_eq!(
            Climate::new(ClimateConfig::new().with_active_state(ActiveStateConfig::new(4)))
                .unwrap_err(),
            ConfigError::EmptyMapping
        );
        let config = ClimateConfig::new()
            .with_switch(SwitchConfig::new(1))
            .with_fan_mode(FanModeConfig::new(5));
        assert_eq!(Climate::new(config).unwrap_err(), ConfigError::EmptyMapping);
    }

    #[test]
    fn switch_drives_mode() {
        let mut climate = thermostat();
        assert_eq!(climate.mode(), None);
        assert_eq!(climate.action(), ClimateAction::Off);

        assert!(climate.handle_datapoint(1, &DatapointValue::Bool(false)));
        assert_eq!(climate.mode(), Some(ClimateMode::Off));

        assert!(climate.handle_datapoint(1, &DatapointValue::Bool(true)));
        assert_eq!(climate.mode(), Some(ClimateMode::Heat));
        // Temperatures unknown.
        assert_eq!(climate.action(), ClimateAction::Off);
    }

    #[test]
    fn action_follows_hysteresis() {
        let mut climate = thermostat();
        climate.handle_datapoint(1, &DatapointValue::Bool(true));
        climate.handle_datapoint(2, &DatapointValue::UInt(44));
        climate.handle_datapoint(3, &DatapointValue::UInt(38));
        assert_eq!(climate.target_temperature(), Some(22.0));
        assert_eq!(climate.current_temperature(), Some(19.0));
        assert_eq!(climate.action(), ClimateAction::Heating);

        assert!(climate.handle_datapoint(3, &DatapointValue::UInt(43)));
        assert_eq!(climate.action(), ClimateAction::Idle);
    }

    #[test]
    fn active_state_reports_mode_and_action() {
        let mut climate = air_conditioner();
        climate.handle_datapoint(1, &DatapointValue::Bool(true));
        assert_eq!(climate.mode(), Some(ClimateMode::HeatCool));
        assert_eq!(climate.action(), ClimateAction::Idle);

        assert!(climate.handle_datapoint(4, &DatapointValue::Enum(3)));
        assert_eq!(climate.mode(), Some(ClimateMode::Dry));
        assert_eq!(climate.action(), ClimateAction::Drying);
    }

    #[test]
    fn mode_writes_switch_and_active_state() {
        let mut climate = air_conditioner();
        let registry = registry_for(&climate);
        let mut commands = Commands::new();

        climate
            .handle_intent(
                ClimateIntent::new().with_mode(ClimateMode::Cool),
                &registry,
                &mut commands,
            )
            .unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].value, DatapointValue::Bool(true));
        assert_eq!(commands[1].number, 4);
        assert_eq!(commands[1].value, DatapointValue::Enum(0));
        assert_eq!(climate.mode(), Some(ClimateMode::Cool));

        let mut commands = Commands::new();
        climate
            .handle_intent(
                ClimateIntent::new().with_mode(ClimateMode::Off),
                &registry,
                &mut commands,
            )
            .unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(climate.mode(), Some(ClimateMode::Off));
    }

    #[test]
    fn fahrenheit_temperatures_are_converted() {
        let config = ClimateConfig::new().with_temperatures(
            TemperatureConfig::new(NumberConfig::new(2))
                .with_current(NumberConfig::new(3))
                .with_reports_fahrenheit(true),
        );
        let mut climate = Climate::new(config).unwrap();
        let registry = registry_for(&climate);
        let mut commands = Commands::new();

        climate
            .handle_intent(
                ClimateIntent::new().with_target_temperature(20.0),
                &registry,
                &mut commands,
            )
            .unwrap();
        assert_eq!(commands[0].value, DatapointValue::UInt(68));

        climate.handle_datapoint(3, &DatapointValue::UInt(77));
        assert_eq!(climate.current_temperature(), Some(25.0));
    }

    #[test]
    fn preset_temperature_overrides_target() {
        let mut climate = thermostat();
        let registry = registry_for(&climate);
        climate.handle_datapoint(2, &DatapointValue::UInt(44));
        assert!(climate.handle_datapoint(4, &DatapointValue::Bool(true)));
        assert_eq!(climate.preset(), ClimatePreset::Eco);
        assert_eq!(climate.target_temperature(), Some(18.0));

        let mut commands = Commands::new();
        climate
            .handle_intent(
                ClimateIntent::new().with_preset(ClimatePreset::Boost),
                &registry,
                &mut commands,
            )
            .unwrap();
        // Boost on, eco off.
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].number, 5);
        assert_eq!(commands[0].value, DatapointValue::Bool(true));
        assert_eq!(commands[1].number, 4);
        assert_eq!(commands[1].value, DatapointValue::Bool(false));
        assert_eq!(climate.preset(), ClimatePreset::Boost);
        // Boost has no temperature of its own.
        assert_eq!(climate.target_temperature(), Some(22.0));

        let mut commands = Commands::new();
        assert_eq!(
            climate.handle_intent(
                ClimateIntent::new().with_preset(ClimatePreset::Sleep),
                &registry,
                &mut commands,
            ),
            Err(IntentError::Unsupported)
        );
        assert!(commands.is_empty());
    }

    #[test]
    fn swing_writes_changed_axes_only() {
        let mut climate = air_conditioner();
        let registry = registry_for(&climate);
        climate.handle_datapoint(6, &DatapointValue::Bool(true));
        climate.handle_datapoint(7, &DatapointValue::Bool(false));
        assert_eq!(climate.swing_mode(), Some(SwingMode::Vertical));

        let mut commands = Commands::new();
        climate
            .handle_intent(
                ClimateIntent::new().with_swing(SwingMode::Both),
                &registry,
                &mut commands,
            )
            .unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].number, 7);
        assert_eq!(climate.swing_mode(), Some(SwingMode::Both));
    }

    #[test]
    fn fan_mode_uses_value_table() {
        let mut climate = air_conditioner();
        let registry = registry_for(&climate);
        assert!(climate.handle_datapoint(5, &DatapointValue::Enum(2)));
        assert_eq!(climate.fan_mode(), Some(ClimateFanMode::Medium));

        let mut commands = Commands::new();
        assert_eq!(
            climate.handle_intent(
                ClimateIntent::new().with_fan_mode(ClimateFanMode::Middle),
                &registry,
                &mut commands,
            ),
            Err(IntentError::Unsupported)
        );
        climate
            .handle_intent(
                ClimateIntent::new().with_fan_mode(ClimateFanMode::Auto),
                &registry,
                &mut commands,
            )
            .unwrap();
        assert_eq!(commands[0].value, DatapointValue::Enum(0));
        assert_eq!(climate.fan_mode(), Some(ClimateFanMode::Auto));
    }

    #[test]
    fn failed_target_write_reverts() {
        let mut climate = thermostat();
        let registry = registry_for(&climate);
        climate.handle_datapoint(2, &DatapointValue::UInt(40));
        let mut commands = Commands::new();

        climate
            .handle_intent(
                ClimateIntent::new().with_target_temperature(23.0),
                &registry,
                &mut commands,
            )
            .unwrap();
        assert_eq!(commands[0].value, DatapointValue::UInt(46));
        assert_eq!(climate.target_temperature(), Some(23.0));
        assert!(climate.is_unconfirmed());

        assert!(climate.command_failed(2));
        assert_eq!(climate.target_temperature(), Some(20.0));
        assert!(!climate.is_unconfirmed());
    }
}
