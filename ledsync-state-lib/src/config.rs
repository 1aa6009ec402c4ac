use log::warn;
use serde::{Deserialize, Serialize};

/// Hard upper bound on the segment table size.
pub const MAX_SEGMENTS_LIMIT: u8 = 32;

/// Static description of the LED strip and its capabilities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StripConfig {
    /// Total number of LEDs across all outputs
    pub total_leds: u16,
    /// Number of segment slots
    #[serde(default = "default_max_segments")]
    pub max_segments: u8,
    /// Number of effects the renderer provides (ids `0..effect_count`)
    #[serde(default = "default_effect_count")]
    pub effect_count: u8,
    /// Number of palettes the renderer provides (ids `0..palette_count`)
    #[serde(default = "default_palette_count")]
    pub palette_count: u8,
    /// Any output has a dedicated white channel (selects 4-channel color arrays)
    #[serde(default)]
    pub white_channel: bool,
    /// Gamma-correct individually written pixels
    #[serde(default)]
    pub gamma_correct_color: bool,
    /// Realtime input only drives the main segment
    #[serde(default)]
    pub use_main_segment_only: bool,
    #[serde(default = "default_preset_cycle_min")]
    pub preset_cycle_min: u8,
    #[serde(default = "default_preset_cycle_max")]
    pub preset_cycle_max: u8,
}

const fn default_max_segments() -> u8 {
    16
}

const fn default_effect_count() -> u8 {
    118
}

const fn default_palette_count() -> u8 {
    71
}

const fn default_preset_cycle_min() -> u8 {
    1
}

const fn default_preset_cycle_max() -> u8 {
    5
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            total_leds: 30,
            max_segments: default_max_segments(),
            effect_count: default_effect_count(),
            palette_count: default_palette_count(),
            white_channel: false,
            gamma_correct_color: false,
            use_main_segment_only: false,
            preset_cycle_min: default_preset_cycle_min(),
            preset_cycle_max: default_preset_cycle_max(),
        }
    }
}

impl StripConfig {
    /// Clamp values to valid ranges
    pub fn validate(&mut self) {
        if self.max_segments == 0 || self.max_segments > MAX_SEGMENTS_LIMIT {
            let clamped = self.max_segments.clamp(1, MAX_SEGMENTS_LIMIT);
            warn!("Clamping max_segments from {} to {clamped}", self.max_segments);
            self.max_segments = clamped;
        }
        if self.effect_count == 0 {
            warn!("effect_count must be at least 1");
            self.effect_count = 1;
        }
        if self.palette_count == 0 {
            warn!("palette_count must be at least 1");
            self.palette_count = 1;
        }
        if self.preset_cycle_min == 0 {
            self.preset_cycle_min = 1;
        }
        if self.preset_cycle_max < self.preset_cycle_min {
            warn!(
                "preset_cycle_max {} below preset_cycle_min {}, raising it",
                self.preset_cycle_max, self.preset_cycle_min
            );
            self.preset_cycle_max = self.preset_cycle_min;
        }
    }

    /// Highest selectable effect id.
    #[must_use]
    pub const fn max_effect(&self) -> u8 {
        self.effect_count.saturating_sub(1)
    }

    /// Highest selectable palette id.
    #[must_use]
    pub const fn max_palette(&self) -> u8 {
        self.palette_count.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: StripConfig = serde_json::from_str(r#"{"total_leds": 120}"#).unwrap();
        assert_eq!(config.total_leds, 120);
        assert_eq!(config.max_segments, 16);
        assert_eq!(config.preset_cycle_min, 1);
        assert!(!config.white_channel);
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = StripConfig {
            max_segments: 200,
            effect_count: 0,
            preset_cycle_min: 4,
            preset_cycle_max: 2,
            ..StripConfig::default()
        };
        config.validate();
        assert_eq!(config.max_segments, MAX_SEGMENTS_LIMIT);
        assert_eq!(config.effect_count, 1);
        assert_eq!(config.preset_cycle_max, 4);
    }
}
