//! Lights composed from optional switch, dimmer, white temperature and color parts.
//!
//! The classic shapes map onto parts as follows:
//!
//! | Shape  | Parts                                  |
//! |--------|----------------------------------------|
//! | binary | switch                                 |
//! | dimmer | switch, dimmer                         |
//! | CT     | switch, dimmer, white temperature      |
//! | RGB    | switch, color                          |
//! | RGBCT  | switch, dimmer, white temperature, color |

use log::{debug, warn};

use super::{
    color::{ColorType, Rgb},
    encode_u32, push_command,
    switch::{BoolDatapoint, SwitchConfig},
    Bindings, Commands, InboundDatapoint, OutboundIntent, Tracked,
};
use crate::{
    error::{ConfigError, IntentError},
    registry::Registry,
    retry::RetryConfig,
    types::{round_u32, DatapointNumber, DatapointType, DatapointValue},
};

fn validate_level_type(datapoint_type: DatapointType) -> Result<(), ConfigError> {
    match datapoint_type {
        DatapointType::UInt | DatapointType::Enum | DatapointType::Detect => Ok(()),
        other => Err(ConfigError::UnsupportedType(other)),
    }
}

/// Map a fraction in `0.0..=1.0` onto `min..=max`, flipped when inverted.
fn fraction_to_raw(fraction: f32, min: u32, max: u32, inverted: bool) -> u32 {
    let span = (max - min) as f32;
    let raw = (min + round_u32(fraction.clamp(0.0, 1.0) * span)).min(max);
    if inverted { max - (raw - min) } else { raw }
}

fn raw_to_fraction(raw: u32, min: u32, max: u32, inverted: bool) -> f32 {
    let raw = raw.clamp(min, max);
    let raw = if inverted { max - (raw - min) } else { raw };
    (raw - min) as f32 / (max - min) as f32
}

/// Brightness datapoint of a light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimmerConfig {
    pub datapoint: DatapointNumber,
    pub datapoint_type: DatapointType,
    pub min_value: u32,
    pub max_value: u32,
    pub inverted: bool,
    /// Datapoint that receives `min_value` once at start-up.
    pub min_value_datapoint: Option<(DatapointNumber, DatapointType)>,
    pub retry: RetryConfig,
}

impl DimmerConfig {
    pub const fn new(datapoint: DatapointNumber) -> Self {
        Self {
            datapoint,
            datapoint_type: DatapointType::UInt,
            min_value: 0,
            max_value: 255,
            inverted: false,
            min_value_datapoint: None,
            retry: RetryConfig::disabled(),
        }
    }

    pub const fn with_datapoint_type(mut self, datapoint_type: DatapointType) -> Self {
        self.datapoint_type = datapoint_type;
        self
    }

    pub const fn with_range(mut self, min_value: u32, max_value: u32) -> Self {
        self.min_value = min_value;
        self.max_value = max_value;
        self
    }

    pub const fn with_inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    pub const fn with_min_value_datapoint(
        mut self,
        datapoint: DatapointNumber,
        datapoint_type: DatapointType,
    ) -> Self {
        self.min_value_datapoint = Some((datapoint, datapoint_type));
        self
    }

    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_level_type(self.datapoint_type)?;
        if let Some((_, datapoint_type)) = self.min_value_datapoint {
            validate_level_type(datapoint_type)?;
        }
        if self.min_value >= self.max_value {
            return Err(ConfigError::InvalidRange);
        }
        Ok(())
    }

    /// Raw datapoint value for a brightness in `0.0..=1.0`.
    pub fn brightness_to_raw(&self, brightness: f32) -> u32 {
        fraction_to_raw(brightness, self.min_value, self.max_value, self.inverted)
    }

    /// Brightness for a raw datapoint value, clamped to the configured range.
    pub fn raw_to_brightness(&self, raw: u32) -> f32 {
        raw_to_fraction(raw, self.min_value, self.max_value, self.inverted)
    }
}

/// Color temperature datapoint of a light, in mireds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WhiteTemperatureConfig {
    pub datapoint: DatapointNumber,
    pub datapoint_type: DatapointType,
    pub min_value: u32,
    pub max_value: u32,
    pub inverted: bool,
    pub cold_white_temperature: f32,
    pub warm_white_temperature: f32,
    pub retry: RetryConfig,
}

impl WhiteTemperatureConfig {
    pub const fn new(datapoint: DatapointNumber) -> Self {
        Self {
            datapoint,
            datapoint_type: DatapointType::UInt,
            min_value: 0,
            max_value: 255,
            inverted: false,
            // 6500 K and 2000 K
            cold_white_temperature: 153.0,
            warm_white_temperature: 500.0,
            retry: RetryConfig::disabled(),
        }
    }

    pub const fn with_datapoint_type(mut self, datapoint_type: DatapointType) -> Self {
        self.datapoint_type = datapoint_type;
        self
    }

    pub const fn with_range(mut self, min_value: u32, max_value: u32) -> Self {
        self.min_value = min_value;
        self.max_value = max_value;
        self
    }

    pub const fn with_inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    /// Cold and warm white temperatures in mireds.
    pub const fn with_temperatures(mut self, cold: f32, warm: f32) -> Self {
        self.cold_white_temperature = cold;
        self.warm_white_temperature = warm;
        self
    }

    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_level_type(self.datapoint_type)?;
        if self.min_value >= self.max_value
            || self.cold_white_temperature >= self.warm_white_temperature
        {
            return Err(ConfigError::InvalidRange);
        }
        Ok(())
    }

    pub fn mireds_to_raw(&self, mireds: f32) -> u32 {
        let cold = self.cold_white_temperature;
        let warm = self.warm_white_temperature;
        let fraction = (mireds.clamp(cold, warm) - cold) / (warm - cold);
        fraction_to_raw(fraction, self.min_value, self.max_value, self.inverted)
    }

    pub fn raw_to_mireds(&self, raw: u32) -> f32 {
        let fraction = raw_to_fraction(raw, self.min_value, self.max_value, self.inverted);
        let cold = self.cold_white_temperature;
        cold + fraction * (self.warm_white_temperature - cold)
    }
}

/// Color datapoint of a light. Always a string datapoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorConfig {
    pub datapoint: DatapointNumber,
    pub color_type: ColorType,
    pub retry: RetryConfig,
}

impl ColorConfig {
    pub const fn new(datapoint: DatapointNumber, color_type: ColorType) -> Self {
        Self {
            datapoint,
            color_type,
            retry: RetryConfig::disabled(),
        }
    }

    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Configuration of a [`Light`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightConfig {
    pub switch: Option<SwitchConfig>,
    pub dimmer: Option<DimmerConfig>,
    pub white_temperature: Option<WhiteTemperatureConfig>,
    pub color: Option<ColorConfig>,
    /// Color and white output are mutually exclusive.
    pub color_interlock: bool,
}

impl LightConfig {
    pub const fn new() -> Self {
        Self {
            switch: None,
            dimmer: None,
            white_temperature: None,
            color: None,
            color_interlock: false,
        }
    }

    pub const fn with_switch(mut self, switch: SwitchConfig) -> Self {
        self.switch = Some(switch);
        self
    }

    pub const fn with_dimmer(mut self, dimmer: DimmerConfig) -> Self {
        self.dimmer = Some(dimmer);
        self
    }

    pub const fn with_white_temperature(mut self, white_temperature: WhiteTemperatureConfig) -> Self {
        self.white_temperature = Some(white_temperature);
        self
    }

    pub const fn with_color(mut self, color: ColorConfig) -> Self {
        self.color = Some(color);
        self
    }

    pub const fn with_color_interlock(mut self, color_interlock: bool) -> Self {
        self.color_interlock = color_interlock;
        self
    }
}

/// A requested light change. Unset fields are left alone.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightIntent {
    pub state: Option<bool>,
    /// Brightness in `0.0..=1.0`.
    pub brightness: Option<f32>,
    /// Color temperature in mireds.
    pub color_temperature: Option<f32>,
    pub color: Option<Rgb>,
}

impl LightIntent {
    pub const fn new() -> Self {
        Self {
            state: None,
            brightness: None,
            color_temperature: None,
            color: None,
        }
    }

    pub const fn turn_on() -> Self {
        Self::new().with_state(true)
    }

    pub const fn turn_off() -> Self {
        Self::new().with_state(false)
    }

    pub const fn with_state(mut self, state: bool) -> Self {
        self.state = Some(state);
        self
    }

    pub const fn with_brightness(mut self, brightness: f32) -> Self {
        self.brightness = Some(brightness);
        self
    }

    pub const fn with_color_temperature(mut self, mireds: f32) -> Self {
        self.color_temperature = Some(mireds);
        self
    }

    pub const fn with_color(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self
    }
}

#[derive(Debug)]
pub struct Light {
    config: LightConfig,
    switch: Option<BoolDatapoint>,
    brightness: Tracked<u32>,
    white_temperature: Tracked<u32>,
    color: Tracked<Rgb>,
    /// Last color the MCU reported that was not black.
    lit_color: Option<Rgb>,
}

impl Light {
    pub fn new(config: LightConfig) -> Result<Self, ConfigError> {
        if config.switch.is_none() && config.dimmer.is_none() && config.color.is_none() {
            return Err(ConfigError::MissingDatapoint);
        }
        if let Some(dimmer) = &config.dimmer {
            dimmer.validate()?;
        }
        if let Some(white_temperature) = &config.white_temperature {
            white_temperature.validate()?;
        }
        let switch = config.switch.map(BoolDatapoint::new).transpose()?;

        Ok(Self {
            config,
            switch,
            brightness: Tracked::default(),
            white_temperature: Tracked::default(),
            color: Tracked::default(),
            lit_color: None,
        })
    }

    pub fn config(&self) -> &LightConfig {
        &self.config
    }

    /// Whether the light is on. Without a switch part, a non-zero brightness counts as on.
    pub fn is_on(&self) -> Option<bool> {
        match (&self.switch, &self.config.dimmer) {
            (Some(switch), _) => switch.state().get(),
            (None, Some(dimmer)) => self
                .brightness
                .get()
                .map(|raw| dimmer.raw_to_brightness(raw) > 0.0),
            (None, None) => self.color.get().map(|color| !color.is_black()),
        }
    }

    pub fn brightness(&self) -> Option<f32> {
        let dimmer = self.config.dimmer.as_ref()?;
        self.brightness.get().map(|raw| dimmer.raw_to_brightness(raw))
    }

    /// Color temperature in mireds.
    pub fn color_temperature(&self) -> Option<f32> {
        let white_temperature = self.config.white_temperature.as_ref()?;
        self.white_temperature
            .get()
            .map(|raw| white_temperature.raw_to_mireds(raw))
    }

    pub fn color(&self) -> Option<Rgb> {
        self.color.get()
    }

    /// Whether any part has a write in flight.
    pub fn is_unconfirmed(&self) -> bool {
        self.switch
            .as_ref()
            .is_some_and(|switch| switch.state().is_unconfirmed())
            || self.brightness.is_unconfirmed()
            || self.white_temperature.is_unconfirmed()
            || self.color.is_unconfirmed()
    }

    pub(crate) fn startup_commands(&self, registry: &Registry, commands: &mut Commands) {
        let Some(dimmer) = &self.config.dimmer else {
            return;
        };
        let Some((number, _)) = dimmer.min_value_datapoint else {
            return;
        };
        match encode_u32(registry, number, dimmer.min_value) {
            Ok(value) => push_command(commands, number, value, dimmer.retry),
            Err(err) => warn!("[DP{}] Cannot write dimmer minimum: {}", number, err),
        }
    }

    fn write_brightness(
        &mut self,
        brightness: f32,
        registry: &Registry,
        commands: &mut Commands,
    ) -> Result<(), IntentError> {
        let Some(dimmer) = &self.config.dimmer else {
            return Ok(());
        };
        let raw = dimmer.brightness_to_raw(brightness);
        let value = encode_u32(registry, dimmer.datapoint, raw)?;
        debug!("[DP{}] Setting brightness to {}", dimmer.datapoint, raw);
        push_command(
            commands,
            dimmer.datapoint,
            value,
            self.brightness.retry_for(raw, dimmer.retry),
        );
        self.brightness.set_desired(raw);
        Ok(())
    }

    fn write_white_temperature(
        &mut self,
        mireds: f32,
        registry: &Registry,
        commands: &mut Commands,
    ) -> Result<(), IntentError> {
        let Some(white_temperature) = &self.config.white_temperature else {
            return Ok(());
        };
        let raw = white_temperature.mireds_to_raw(mireds);
        let value = encode_u32(registry, white_temperature.datapoint, raw)?;
        push_command(
            commands,
            white_temperature.datapoint,
            value,
            self.white_temperature.retry_for(raw, white_temperature.retry),
        );
        self.white_temperature.set_desired(raw);
        Ok(())
    }

    fn write_color(&mut self, color: Rgb, commands: &mut Commands) {
        let Some(config) = &self.config.color else {
            return;
        };
        let color = color.quantized();
        let text = config.color_type.encode(color);
        debug!("[DP{}] Setting color to {}", config.datapoint, text);
        push_command(
            commands,
            config.datapoint,
            DatapointValue::String(text),
            self.color.retry_for(color, config.retry),
        );
        self.color.set_desired(color);
    }
}

impl InboundDatapoint for Light {
    fn bindings(&self) -> Bindings {
        let mut bindings = Bindings::new();
        if let Some(switch) = &self.switch {
            switch.bind(&mut bindings);
        }
        if let Some(dimmer) = &self.config.dimmer {
            let _ = bindings.push((dimmer.datapoint, dimmer.datapoint_type));
            if let Some(min_value_datapoint) = dimmer.min_value_datapoint {
                let _ = bindings.push(min_value_datapoint);
            }
        }
        if let Some(white_temperature) = &self.config.white_temperature {
            let _ = bindings.push((white_temperature.datapoint, white_temperature.datapoint_type));
        }
        if let Some(color) = &self.config.color {
            let _ = bindings.push((color.datapoint, DatapointType::String));
        }
        bindings
    }

    fn handle_datapoint(&mut self, number: DatapointNumber, value: &DatapointValue) -> bool {
        let mut changed = false;
        if let Some(switch) = &mut self.switch {
            changed |= switch.on_value(number, value).unwrap_or(false);
        }
        if let Some(dimmer) = &self.config.dimmer
            && dimmer.datapoint == number
            && let Some(raw) = value.as_u32()
        {
            changed |= self.brightness.confirm(raw);
        }
        if let Some(white_temperature) = &self.config.white_temperature
            && white_temperature.datapoint == number
            && let Some(raw) = value.as_u32()
        {
            changed |= self.white_temperature.confirm(raw);
        }
        if let Some(config) = &self.config.color
            && config.datapoint == number
        {
            let decoded = match value {
                DatapointValue::String(text) => config.color_type.decode(text),
                _ => None,
            };
            match decoded {
                Some(color) => {
                    if !color.is_black() {
                        self.lit_color = Some(color);
                    }
                    changed |= self.color.confirm(color);
                }
                None => warn!("[DP{}] Unable to decode color {:?}", number, value),
            }
        }
        changed
    }

    fn command_failed(&mut self, number: DatapointNumber) -> bool {
        let mut changed = false;
        if let Some(switch) = &mut self.switch {
            changed |= switch.failed(number);
        }
        if self.config.dimmer.is_some_and(|dimmer| dimmer.datapoint == number) {
            changed |= self.brightness.revert();
        }
        if self
            .config
            .white_temperature
            .is_some_and(|white_temperature| white_temperature.datapoint == number)
        {
            changed |= self.white_temperature.revert();
        }
        if self.config.color.is_some_and(|color| color.datapoint == number) {
            changed |= self.color.revert();
        }
        changed
    }
}

impl OutboundIntent for Light {
    type Intent = LightIntent;

    fn handle_intent(
        &mut self,
        intent: LightIntent,
        registry: &Registry,
        commands: &mut Commands,
    ) -> Result<(), IntentError> {
        if intent.state == Some(false) {
            // Without a switch, off is the lowest brightness or black.
            if let Some(switch) = &mut self.switch {
                return switch.write(false, registry, commands);
            }
            if self.config.dimmer.is_some() {
                return self.write_brightness(0.0, registry, commands);
            }
            self.write_color(Rgb::default(), commands);
            return Ok(());
        }

        let interlocked = self.config.color_interlock && self.config.color.is_some();
        match intent.color {
            Some(color) if interlocked => {
                let brightness = intent.brightness.unwrap_or(1.0);
                self.write_color(color.scaled(brightness), commands);
            }
            color => {
                let brightness = match intent.brightness {
                    Some(brightness) => Some(brightness),
                    // Lights without a switch need a brightness to turn on.
                    None if self.switch.is_none()
                        && intent.state == Some(true)
                        && self.brightness().is_none_or(|brightness| brightness <= 0.0) =>
                    {
                        Some(1.0)
                    }
                    None => None,
                };
                if let Some(brightness) = brightness {
                    self.write_brightness(brightness, registry, commands)?;
                }
                if let Some(mireds) = intent.color_temperature {
                    self.write_white_temperature(mireds, registry, commands)?;
                }
                match color {
                    Some(color) => self.write_color(color, commands),
                    // Color-only lights turn on with their last lit color, or white.
                    None if self.switch.is_none()
                        && self.config.dimmer.is_none()
                        && intent.state == Some(true)
                        && self.color.get().is_none_or(|color| color.is_black()) =>
                    {
                        let color = self.lit_color.unwrap_or(Rgb::new(1.0, 1.0, 1.0));
                        self.write_color(color, commands);
                    }
                    None => {}
                }
            }
        }

        if intent.state == Some(true)
            && let Some(switch) = &mut self.switch
        {
            switch.write(true, registry, commands)?;
        }
        Ok(())
    }
}
