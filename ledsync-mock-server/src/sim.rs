//! Simulated collaborators
//!
//! `SimRenderer` keeps a pixel buffer instead of driving LEDs, and
//! `MemoryServices` keeps presets in memory.

use std::collections::HashMap;
use std::time::Instant;

use ledsync_state_lib::segment::{Segment, SegmentOption};
use ledsync_state_lib::{CallMode, Record, Renderer, Rgbw, Services};
use log::{debug, info};
use serde_json::Value as Json;

pub struct SimRenderer {
    started: Instant,
    pixels: Vec<Rgbw>,
    brightness: u8,
    transition_ms: u32,
    frames_requested: u32,
}

impl SimRenderer {
    pub fn new(total_leds: u16) -> Self {
        Self {
            started: Instant::now(),
            pixels: vec![Rgbw::BLACK; usize::from(total_leds)],
            brightness: 0,
            transition_ms: 0,
            frames_requested: 0,
        }
    }

    fn fill_range(&mut self, start: u16, stop: u16, color: Rgbw) {
        let stop = usize::from(stop).min(self.pixels.len());
        let start = usize::from(start).min(stop);
        self.pixels[start..stop].fill(color);
    }
}

impl Renderer for SimRenderer {
    #[allow(clippy::cast_possible_truncation)] // Millisecond counter wraps like a hardware tick
    fn now_ms(&self) -> u32 {
        self.started.elapsed().as_millis() as u32
    }

    fn trigger(&mut self) {
        self.frames_requested = self.frames_requested.wrapping_add(1);
        debug!("Redraw requested ({} so far)", self.frames_requested);
    }

    fn set_transition(&mut self, duration_ms: u32) {
        if duration_ms != self.transition_ms {
            debug!("Transition set to {duration_ms} ms");
            self.transition_ms = duration_ms;
        }
    }

    fn set_brightness(&mut self, bri: u8, direct: bool) {
        debug!("Brightness {} -> {bri} (direct: {direct})", self.brightness);
        self.brightness = bri;
    }

    fn segment_changed(&mut self, id: u8, previous: (u16, u16)) {
        debug!("Segment {id} moved from {}..{}", previous.0, previous.1);
        self.fill_range(previous.0, previous.1, Rgbw::BLACK);
    }

    fn reset_segment(&mut self, id: u8) {
        debug!("Segment {id} effect reset");
    }

    fn fill_segment(&mut self, segment: &Segment, color: Rgbw) {
        self.fill_range(segment.start, segment.stop, color);
    }

    fn set_pixel(&mut self, segment: &Segment, index: u16, color: Rgbw) {
        let group = u32::from(segment.grouping.max(1));
        let stride = group + u32::from(segment.spacing);
        let base = u32::from(index) * stride;
        for offset in 0..group {
            let Ok(relative) = u16::try_from(base + offset) else {
                return;
            };
            if relative >= segment.length() {
                return;
            }
            let physical = if segment.option(SegmentOption::Reversed) {
                segment.stop - 1 - relative
            } else {
                segment.start + relative
            };
            if let Some(pixel) = self.pixels.get_mut(usize::from(physical)) {
                *pixel = color;
            }
        }
    }

    fn fill_strip(&mut self, color: Rgbw) {
        self.pixels.fill(color);
    }

    fn pixel_color(&self, index: u16) -> Rgbw {
        self.pixels
            .get(usize::from(index))
            .copied()
            .unwrap_or_default()
    }
}

#[derive(Default)]
pub struct MemoryServices {
    presets: HashMap<u8, Json>,
    pending: Option<(u8, CallMode)>,
}

impl MemoryServices {
    /// Preset load requested by the last request, with its stored document.
    pub fn take_pending(&mut self) -> Option<(u8, CallMode, Json)> {
        let (id, mode) = self.pending.take()?;
        match self.presets.get(&id) {
            Some(preset) => Some((id, mode, preset.clone())),
            None => {
                info!("Preset {id} does not exist");
                None
            }
        }
    }
}

impl Services for MemoryServices {
    fn save_preset(&mut self, id: u8, request: &Record, mut snapshot: Json) {
        if let (Some(name), Json::Object(map)) = (request.get("n").as_str(), &mut snapshot) {
            map.insert("n".to_string(), Json::from(name));
        }
        info!("Stored preset {id}");
        self.presets.insert(id, snapshot);
    }

    fn delete_preset(&mut self, id: u8) {
        if self.presets.remove(&id).is_some() {
            info!("Deleted preset {id}");
        }
    }

    fn apply_preset(&mut self, id: u8, mode: CallMode) {
        self.pending = Some((id, mode));
    }

    fn handle_command(&mut self, command: &str) {
        info!("Ignoring legacy command {command:?}");
    }

    fn set_time(&mut self, epoch_secs: u32) {
        debug!("Client time {epoch_secs}");
    }

    fn state_updated(&mut self, mode: CallMode, changed: bool) {
        debug!("State updated ({mode:?}, changed: {changed})");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_pixel_respects_grouping_and_reverse() {
        let mut renderer = SimRenderer::new(10);
        let mut segment = Segment {
            start: 2,
            stop: 8,
            grouping: 2,
            ..Segment::default()
        };
        renderer.set_pixel(&segment, 1, Rgbw::new(1, 0, 0, 0));
        assert_eq!(renderer.pixel_color(4), Rgbw::new(1, 0, 0, 0));
        assert_eq!(renderer.pixel_color(5), Rgbw::new(1, 0, 0, 0));

        segment.set_option(SegmentOption::Reversed, true);
        renderer.set_pixel(&segment, 0, Rgbw::new(2, 0, 0, 0));
        assert_eq!(renderer.pixel_color(7), Rgbw::new(2, 0, 0, 0));
        assert_eq!(renderer.pixel_color(6), Rgbw::new(2, 0, 0, 0));
    }

    #[test]
    fn test_segment_change_blanks_old_range() {
        let mut renderer = SimRenderer::new(10);
        renderer.fill_strip(Rgbw::new(9, 9, 9, 0));
        renderer.segment_changed(0, (0, 5));
        assert_eq!(renderer.pixel_color(4), Rgbw::BLACK);
        assert_eq!(renderer.pixel_color(5), Rgbw::new(9, 9, 9, 0));
    }

    #[test]
    fn test_preset_store_and_load() {
        let mut services = MemoryServices::default();
        let mut request = Record::new();
        request.insert("n", "Evening");
        services.save_preset(3, &request, json!({"bri": 40}));

        services.apply_preset(3, CallMode::DirectChange);
        let (id, _, preset) = services.take_pending().unwrap();
        assert_eq!(id, 3);
        assert_eq!(preset, json!({"bri": 40, "n": "Evening"}));

        services.apply_preset(9, CallMode::DirectChange);
        assert!(services.take_pending().is_none());
    }
}
