//! Segment colors and the color-slot parser
//!
//! A color slot accepts, in order of precedence:
//!
//! 1. an array of integers, read as `R, G, B[, W]` (empty array = no change)
//! 2. a hex string of 6 (`RRGGBB`) or 8 (`RRGGBBWW`) digits
//! 3. a non-negative integer color temperature in Kelvin (`0` = off)
//!
//! Anything else leaves the slot unchanged.

pub use rgb::RGB8;

use crate::value::Value;

/// Gamma applied to individually written pixels when correction is enabled.
const GAMMA: f32 = 2.8;

/// Four-channel LED color (RGB plus a dedicated white channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rgbw {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub w: u8,
}

impl Rgbw {
    pub const BLACK: Self = Self::new(0, 0, 0, 0);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, w: u8) -> Self {
        Self { r, g, b, w }
    }

    #[must_use]
    pub const fn from_channels(c: [u8; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }

    #[must_use]
    pub const fn channels(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.w]
    }

    #[must_use]
    pub const fn rgb(self) -> RGB8 {
        RGB8 {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }

    /// Fold the white channel into RGB (saturating), for RGB-only previews.
    #[must_use]
    pub const fn to_rgb_with_white(self) -> RGB8 {
        RGB8 {
            r: self.r.saturating_add(self.w),
            g: self.g.saturating_add(self.w),
            b: self.b.saturating_add(self.w),
        }
    }

    #[must_use]
    pub fn gamma_corrected(self) -> Self {
        Self::from_channels(self.channels().map(gamma8))
    }
}

impl From<RGB8> for Rgbw {
    fn from(c: RGB8) -> Self {
        Self::new(c.r, c.g, c.b, 0)
    }
}

/// Gamma-correct one 8-bit channel.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn gamma8(value: u8) -> u8 {
    let normalized = f32::from(value) / 255.0;
    // Result is in [0.0, 255.5), so the cast cannot truncate out of u8 range.
    (normalized.powf(GAMMA) * 255.0 + 0.5) as u8
}

/// Approximate the color of a black body at `kelvin` (white channel stays 0).
///
/// Integer hundreds of Kelvin are used, as in the classic Tanner Helland fit.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn kelvin_to_rgb(kelvin: u16) -> RGB8 {
    let temp = f32::from(kelvin / 100);

    let (r, g, b) = if temp <= 66.0 {
        let g = (99.470_8 * temp.ln() - 161.119_57).round();
        let b = if temp <= 19.0 {
            0.0
        } else {
            (138.517_73 * (temp - 10.0).ln() - 305.044_8).round()
        };
        (255.0, g, b)
    } else {
        let r = (329.698_73 * (temp - 60.0).powf(-0.133_204_76)).round();
        let g = (288.122_16 * (temp - 60.0).powf(-0.075_514_85)).round();
        (r, g, 255.0)
    };

    // Clamped to [0, 255] first; NaN/-inf from ln(0) clamp to 0.
    let channel = |v: f32| if v.is_nan() { 0 } else { v.clamp(0.0, 255.0) as u8 };
    RGB8::new(channel(r), channel(g), channel(b))
}

/// Map a `cct` field to the stored 0–255 white-balance value.
///
/// Values up to 255 are taken as-is; larger values are Kelvin in 1900–10091.
#[must_use]
pub fn cct_from_input(value: u16) -> u8 {
    if value <= 255 {
        return u8::try_from(value).unwrap_or(u8::MAX);
    }
    let kelvin = value.clamp(1900, 10091);
    u8::try_from((kelvin - 1900) >> 5).unwrap_or(u8::MAX)
}

/// Decode a 6- or 8-digit hex color string.
#[must_use]
pub fn parse_hex_color(text: &str) -> Option<Rgbw> {
    if text.len() != 6 && text.len() != 8 {
        return None;
    }
    let bytes = hex::decode(text).ok()?;
    let mut c = [0u8; 4];
    c[..bytes.len()].copy_from_slice(&bytes);
    Some(Rgbw::from_channels(c))
}

/// Read up to four integer channels; non-integers count as 0.
fn channels_from_list(items: &[Value]) -> Rgbw {
    let mut c = [0u8; 4];
    for (slot, item) in c.iter_mut().zip(items) {
        let n = item.as_i64().unwrap_or(0);
        *slot = u8::try_from(n.clamp(0, 255)).unwrap_or(0);
    }
    Rgbw::from_channels(c)
}

/// Resolve one `col` element into a color, or `None` to leave the slot unchanged.
#[must_use]
pub fn resolve_color_slot(element: &Value) -> Option<Rgbw> {
    match element {
        Value::List(items) if items.is_empty() => None,
        Value::List(items) => Some(channels_from_list(items)),
        Value::Text(text) => parse_hex_color(text),
        Value::Integer(0) => Some(Rgbw::BLACK),
        Value::Integer(kelvin) if *kelvin > 0 => {
            let kelvin = u16::try_from(*kelvin).unwrap_or(u16::MAX);
            Some(kelvin_to_rgb(kelvin).into())
        }
        _ => None,
    }
}

/// Resolve one color of a pixel-override list; unreadable input paints black.
#[must_use]
pub fn resolve_override_color(element: &Value) -> Rgbw {
    match element {
        Value::List(items) if (1..=4).contains(&items.len()) => channels_from_list(items),
        Value::Text(text) => parse_hex_color(text).unwrap_or(Rgbw::BLACK),
        _ => Rgbw::BLACK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_forms() {
        let rgb = Value::List(vec![Value::Integer(255), Value::Integer(160), Value::Integer(0)]);
        assert_eq!(resolve_color_slot(&rgb), Some(Rgbw::new(255, 160, 0, 0)));

        let rgbw = Value::List((1..=4).map(Value::Integer).collect());
        assert_eq!(resolve_color_slot(&rgbw), Some(Rgbw::new(1, 2, 3, 4)));

        let clamped = Value::List(vec![Value::Integer(300), Value::Integer(-4), Value::Integer(9)]);
        assert_eq!(resolve_color_slot(&clamped), Some(Rgbw::new(255, 0, 9, 0)));

        assert_eq!(resolve_color_slot(&Value::List(vec![])), None);
    }

    #[test]
    fn test_hex_forms() {
        assert_eq!(resolve_color_slot(&Value::from("FF0000")), Some(Rgbw::new(255, 0, 0, 0)));
        assert_eq!(resolve_color_slot(&Value::from("00ff0080")), Some(Rgbw::new(0, 255, 0, 128)));
        assert_eq!(resolve_color_slot(&Value::from("FFF")), None);
        assert_eq!(resolve_color_slot(&Value::from("GGGGGG")), None);
    }

    #[test]
    fn test_kelvin_forms() {
        assert_eq!(resolve_color_slot(&Value::Integer(0)), Some(Rgbw::BLACK));
        assert_eq!(resolve_color_slot(&Value::Integer(-1)), None);
        assert_eq!(resolve_color_slot(&Value::Absent), None);

        // Warm white: full red, no white channel
        let warm = resolve_color_slot(&Value::Integer(2700)).unwrap();
        assert_eq!(warm.r, 255);
        assert!(warm.g > warm.b);
        assert_eq!(warm.w, 0);

        // Cool white: full blue
        let cool = kelvin_to_rgb(10000);
        assert_eq!(cool.b, 255);
        assert!(cool.r < 255);
    }

    #[test]
    fn test_kelvin_reference_points() {
        assert_eq!(kelvin_to_rgb(6600), RGB8::new(255, 255, 253));
        assert_eq!(kelvin_to_rgb(1000), RGB8::new(255, 68, 0));
        assert_eq!(kelvin_to_rgb(50), RGB8::new(255, 0, 0));
    }

    #[test]
    fn test_cct_mapping() {
        assert_eq!(cct_from_input(0), 0);
        assert_eq!(cct_from_input(127), 127);
        assert_eq!(cct_from_input(1900), 0);
        assert_eq!(cct_from_input(1000), 0);
        assert_eq!(cct_from_input(10091), 255);
        assert_eq!(cct_from_input(20000), 255);
    }

    #[test]
    fn test_override_colors() {
        assert_eq!(resolve_override_color(&Value::from("0000FF")), Rgbw::new(0, 0, 255, 0));
        assert_eq!(resolve_override_color(&Value::from("nope")), Rgbw::BLACK);
        assert_eq!(resolve_override_color(&Value::List(vec![])), Rgbw::BLACK);
        assert_eq!(resolve_override_color(&Value::Boolean(true)), Rgbw::BLACK);
    }

    #[test]
    fn test_gamma_endpoints() {
        assert_eq!(gamma8(0), 0);
        assert_eq!(gamma8(255), 255);
        assert!(gamma8(128) < 128);
    }
}
