//! Color string encodings used by light color datapoints.

use alloc::string::String;
use strum_macros::{EnumIter, IntoStaticStr};

use crate::types::round_u32;

/// RGB color with every channel in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgb {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl Rgb {
    pub const fn new(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }

    pub fn is_black(&self) -> bool {
        self.red <= 0.0 && self.green <= 0.0 && self.blue <= 0.0
    }

    /// Multiply every channel by `factor`.
    pub fn scaled(self, factor: f32) -> Self {
        let factor = factor.clamp(0.0, 1.0);
        Self::new(self.red * factor, self.green * factor, self.blue * factor)
    }

    /// Snap every channel to the nearest 8 bit step.
    pub fn quantized(self) -> Self {
        let [red, green, blue] = self.to_bytes();
        Self::from_bytes([red, green, blue])
    }

    fn to_bytes(self) -> [u8; 3] {
        [
            channel_to_byte(self.red),
            channel_to_byte(self.green),
            channel_to_byte(self.blue),
        ]
    }

    fn from_bytes([red, green, blue]: [u8; 3]) -> Self {
        Self::new(
            f32::from(red) / 255.0,
            f32::from(green) / 255.0,
            f32::from(blue) / 255.0,
        )
    }
}

fn channel_to_byte(channel: f32) -> u8 {
    round_u32(channel.clamp(0.0, 1.0) * 255.0).min(255) as u8
}

/// Hue in degrees, saturation and value in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hsv {
    pub hue: f32,
    pub saturation: f32,
    pub value: f32,
}

impl From<Rgb> for Hsv {
    fn from(color: Rgb) -> Self {
        let Rgb { red, green, blue } = color;
        let max = red.max(green).max(blue);
        let min = red.min(green).min(blue);
        let delta = max - min;

        let hue = if delta <= 0.0 {
            0.0
        } else if max == red {
            60.0 * ((green - blue) / delta)
        } else if max == green {
            60.0 * ((blue - red) / delta + 2.0)
        } else {
            60.0 * ((red - green) / delta + 4.0)
        };
        let hue = if hue < 0.0 { hue + 360.0 } else { hue };
        let saturation = if max <= 0.0 { 0.0 } else { delta / max };

        Self {
            hue,
            saturation,
            value: max,
        }
    }
}

impl From<Hsv> for Rgb {
    fn from(color: Hsv) -> Self {
        let hue = color.hue % 360.0;
        let hue = if hue < 0.0 { hue + 360.0 } else { hue };
        let saturation = color.saturation.clamp(0.0, 1.0);
        let value = color.value.clamp(0.0, 1.0);

        let chroma = value * saturation;
        let sector = hue / 60.0;
        let offset = sector % 2.0 - 1.0;
        let offset = if offset < 0.0 { -offset } else { offset };
        let x = chroma * (1.0 - offset);
        let m = value - chroma;

        let (red, green, blue) = match sector as u32 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };
        Self::new(red + m, green + m, blue + m)
    }
}

/// How a color is encoded into a string datapoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, IntoStaticStr)]
pub enum ColorType {
    /// `rrggbb`
    #[default]
    Rgb,
    /// `hhhhssssvvvv`, hue 0-360, saturation and value 0-1000.
    Hsv,
    /// `rrggbbhhhhssvv`, saturation and value 0-255.
    RgbHsv,
}

impl ColorType {
    pub fn encode(self, color: Rgb) -> String {
        let rgb = color.to_bytes();
        let hsv = Hsv::from(color);
        let hue = (round_u32(hsv.hue) % 360) as u16;
        match self {
            Self::Rgb => hex::encode(rgb),
            Self::Hsv => {
                let saturation = round_u32(hsv.saturation * 1000.0).min(1000) as u16;
                let value = round_u32(hsv.value * 1000.0).min(1000) as u16;
                let [h0, h1] = hue.to_be_bytes();
                let [s0, s1] = saturation.to_be_bytes();
                let [v0, v1] = value.to_be_bytes();
                hex::encode([h0, h1, s0, s1, v0, v1])
            }
            Self::RgbHsv => {
                let [h0, h1] = hue.to_be_bytes();
                let saturation = channel_to_byte(hsv.saturation);
                let value = channel_to_byte(hsv.value);
                hex::encode([rgb[0], rgb[1], rgb[2], h0, h1, saturation, value])
            }
        }
    }

    /// Decode a color string. Returns `None` if it does not match the encoding.
    pub fn decode(self, text: &str) -> Option<Rgb> {
        match self {
            Self::Rgb => {
                let mut rgb = [0u8; 3];
                hex::decode_to_slice(text, &mut rgb).ok()?;
                Some(Rgb::from_bytes(rgb))
            }
            Self::Hsv => {
                let mut bytes = [0u8; 6];
                hex::decode_to_slice(text, &mut bytes).ok()?;
                let [h0, h1, s0, s1, v0, v1] = bytes;
                Some(Rgb::from(Hsv {
                    hue: f32::from(u16::from_be_bytes([h0, h1])),
                    saturation: f32::from(u16::from_be_bytes([s0, s1])) / 1000.0,
                    value: f32::from(u16::from_be_bytes([v0, v1])) / 1000.0,
                }))
            }
            // The RGB prefix carries the full color, the HSV suffix is redundant.
            Self::RgbHsv => {
                let mut bytes = [0u8; 7];
                hex::decode_to_slice(text, &mut bytes).ok()?;
                Some(Rgb::from_bytes([bytes[0], bytes[1], bytes[2]]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb = Rgb::new(1.0, 0.0, 0.0);

    #[test]
    fn encode_red() {
        assert_eq!(ColorType::Rgb.encode(RED), "ff0000");
        assert_eq!(ColorType::Hsv.encode(RED), "000003e803e8");
        assert_eq!(ColorType::RgbHsv.encode(RED), "ff00000000ffff");
    }

    #[test]
    fn decode_each_encoding() {
        assert_eq!(ColorType::Rgb.decode("00ff00"), Some(Rgb::new(0.0, 1.0, 0.0)));
        assert_eq!(ColorType::Hsv.decode("000003e803e8"), Some(RED));
        assert_eq!(ColorType::RgbHsv.decode("0000ff00f0ffff"), Some(Rgb::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn decode_rejects_wrong_shapes() {
        assert_eq!(ColorType::Rgb.decode("ff00"), None);
        assert_eq!(ColorType::Rgb.decode("gg0000"), None);
        assert_eq!(ColorType::Hsv.decode("ff0000"), None);
    }

    #[test]
    fn hsv_of_secondary_colors() {
        let hsv = Hsv::from(Rgb::new(0.0, 1.0, 1.0));
        assert_eq!(hsv.hue, 180.0);
        assert_eq!(hsv.saturation, 1.0);
        assert_eq!(hsv.value, 1.0);

        let back = Rgb::from(hsv);
        assert_eq!(back, Rgb::new(0.0, 1.0, 1.0));
    }

    #[test]
    fn quantize_snaps_to_bytes() {
        let color = Rgb::new(0.5, 0.0, 1.0).quantized();
        assert_eq!(color.red, 128.0 / 255.0);
        assert!(Rgb::default().is_black());
    }
}
