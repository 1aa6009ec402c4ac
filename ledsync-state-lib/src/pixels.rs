//! Individual pixel overrides (`"i"` segment field)
//!
//! The list is read left to right. Integers set a pending start index, a second
//! consecutive integer sets an exclusive stop. A color paints the pending range
//! (or just the start pixel) and clears it; a color with no index before it
//! paints the cursor pixel and moves the cursor on by one.
//!
//! ```text
//!   ["FF0000", "00FF00"]         pixel 0 red, pixel 1 green
//!   [5, "0000FF"]                pixel 5 blue
//!   [10, 20, [255, 255, 0]]      pixels 10..20 yellow
//! ```

use log::debug;

use crate::color::{resolve_override_color, Rgbw};
use crate::host::Renderer;
use crate::segment::SegmentOption;
use crate::state::DeviceState;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Nothing,
    Start,
    Range,
}

/// Decode an override list into `(virtual index, color)` writes below `limit`.
pub fn write_pixel_overrides(items: &[Value], limit: u16, gamma: bool, mut write: impl FnMut(u16, Rgbw)) {
    let mut start: u16 = 0;
    let mut stop: u16 = 0;
    let mut pending = Pending::Nothing;

    for item in items {
        if let Value::Integer(n) = item {
            let Ok(index) = u16::try_from(*n) else {
                debug!("Skipping pixel index {n}");
                continue;
            };
            if pending == Pending::Nothing {
                start = index;
                pending = Pending::Start;
            } else {
                stop = index;
                pending = Pending::Range;
            }
            continue;
        }

        let mut color = resolve_override_color(item);
        if gamma {
            color = color.gamma_corrected();
        }
        if pending != Pending::Range {
            stop = start.saturating_add(1);
        }
        for index in start..stop.min(limit) {
            write(index, color);
        }
        if pending == Pending::Nothing {
            start = start.saturating_add(1);
        }
        pending = Pending::Nothing;
    }
}

impl DeviceState {
    /// Freeze segment `id` and paint the override list over it.
    ///
    /// Brightness is committed without a transition so the written colors show at once.
    pub(crate) fn apply_pixel_overrides(&mut self, id: u8, items: &[Value], renderer: &mut dyn Renderer) {
        self.transition_delay_temp = 0;
        self.transition_once = true;
        renderer.set_brightness(self.bri, true);

        let gamma = self.strip.config().gamma_correct_color;
        let Some(segment) = self.strip.segment_mut(id) else {
            return;
        };
        if !segment.option(SegmentOption::Freeze) {
            segment.set_option(SegmentOption::Freeze, true);
            renderer.fill_segment(segment, Rgbw::BLACK);
        }

        let segment = &*segment;
        write_pixel_overrides(items, segment.virtual_length(), gamma, |index, color| {
            renderer.set_pixel(segment, index, color);
        });
        renderer.trigger();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::record_from_json;
    use serde_json::json;

    fn writes(items: serde_json::Value, limit: u16) -> Vec<(u16, Rgbw)> {
        let record = record_from_json(json!({ "i": items }));
        let mut out = Vec::new();
        write_pixel_overrides(record.get("i").as_list().unwrap(), limit, false, |i, c| out.push((i, c)));
        out
    }

    const RED: Rgbw = Rgbw::new(255, 0, 0, 0);
    const GREEN: Rgbw = Rgbw::new(0, 255, 0, 0);
    const BLUE: Rgbw = Rgbw::new(0, 0, 255, 0);

    #[test]
    fn test_implicit_cursor() {
        assert_eq!(
            writes(json!(["FF0000", "00FF00", "0000FF"]), 30),
            [(0, RED), (1, GREEN), (2, BLUE)]
        );
    }

    #[test]
    fn test_single_index() {
        assert_eq!(writes(json!([5, "FF0000"]), 30), [(5, RED)]);
    }

    #[test]
    fn test_explicit_range() {
        let out = writes(json!([2, 5, [0, 0, 255]]), 30);
        assert_eq!(out, [(2, BLUE), (3, BLUE), (4, BLUE)]);
    }

    #[test]
    fn test_range_then_implicit_color_reuses_start() {
        let out = writes(json!([2, 4, "FF0000", "00FF00"]), 30);
        assert_eq!(out, [(2, RED), (3, RED), (2, GREEN)]);
    }

    #[test]
    fn test_limit_and_negative_indices() {
        assert_eq!(writes(json!([8, 20, "FF0000"]), 10), [(8, RED), (9, RED)]);
        assert_eq!(writes(json!([-1, "FF0000"]), 10), [(0, RED)]);
    }

    #[test]
    fn test_unreadable_color_paints_black() {
        assert_eq!(writes(json!([3, "zz"]), 10), [(3, Rgbw::BLACK)]);
    }

    #[test]
    fn test_gamma_applied() {
        let record = record_from_json(json!({ "i": [[128, 0, 0]] }));
        let mut out = Vec::new();
        write_pixel_overrides(record.get("i").as_list().unwrap(), 10, true, |i, c| out.push((i, c)));
        assert_eq!(out.len(), 1);
        assert!(out[0].1.r < 128);
    }
}
