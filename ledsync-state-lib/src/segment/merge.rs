//! Partial updates of one segment
//!
//! Every field is optional and malformed fields are skipped, so a merge never
//! fails. The only outputs are the mutated segment and the device's
//! `state_changed` flag.

use log::debug;

use crate::coerce::apply_u8;
use crate::color::{cct_from_input, resolve_color_slot};
use crate::host::Host;
use crate::segment::{SegmentDiff, SegmentName, SegmentOption, FX_MODE_STATIC};
use crate::state::DeviceState;
use crate::strip::SegmentBounds;
use crate::value::{Record, Value};

/// Fields that only steer replication and must not reach the copies.
const REPLICATION_FIELDS: [&str; 3] = ["id", "rpt", "n"];

/// Map a requested rotation offset into `[0, len]`, counting negative offsets from the end.
///
/// Callers clamp the result to `len - 1` once the segment is known to be active.
#[must_use]
pub fn wrap_offset(offset: i64, len: u16) -> u16 {
    let len = u64::from(len.max(1));
    let mut abs = offset.unsigned_abs();
    if abs > len - 1 {
        abs %= len;
    }
    if offset < 0 {
        abs = len - abs;
    }
    u16::try_from(abs).unwrap_or(0)
}

/// Boolean field that also accepts a toggle string.
fn apply_flag(value: &Value, current: bool) -> bool {
    match value.as_bool() {
        Some(b) => b,
        None if value.is_toggle() => !current,
        None => current,
    }
}

impl DeviceState {
    /// Merge one segment record into the table.
    ///
    /// `default_id` is used when the record has no `id`. `preset_id` is set when
    /// the request comes from a stored preset.
    pub fn merge_segment(&mut self, record: &Record, default_id: u8, preset_id: Option<u8>, host: &mut Host<'_>) {
        let id = match record.get("id") {
            Value::Integer(n) if *n >= 0 => u8::try_from(*n).unwrap_or(u8::MAX),
            _ => default_id,
        };
        if id >= self.strip.max_segments() {
            debug!("Ignoring update for segment {id}: out of range");
            return;
        }
        let Some(prev) = self.strip.segment(id).cloned() else {
            return;
        };

        let start = record.get("start").integer::<u16>().unwrap_or(prev.start);
        let stop = match record.get("stop").integer::<u16>() {
            Some(stop) => stop,
            None => match record.get("len").integer::<u16>() {
                Some(len) if len > 0 => start.saturating_add(len),
                _ => prev.stop,
            },
        };

        if record.get("rpt").as_bool() == Some(true) && stop > start {
            self.replicate_segment(record, id, start, stop - start, preset_id, host);
            return;
        }

        let bounds_changed = start != prev.start || stop != prev.stop;
        if let Some(segment) = self.strip.segment_mut(id) {
            match record.get("n") {
                Value::Absent if bounds_changed => segment.name = None,
                Value::Absent => {}
                name => segment.name = name.as_str().and_then(SegmentName::new),
            }
        }

        let len = if stop > start { stop - start } else { 1 };
        let mut offset = match record.get("of").as_i64() {
            Some(requested) => wrap_offset(requested, len),
            None => prev.offset,
        };
        if stop > start {
            offset = offset.min(len - 1);
        }
        let bounds = SegmentBounds {
            start,
            stop,
            grouping: record.get("grp").integer::<u8>().unwrap_or(prev.grouping),
            spacing: record.get("spc").integer::<u8>().unwrap_or(prev.spacing),
            offset,
        };
        self.strip.configure_segment(id, bounds, host.renderer);

        let max_effect = self.strip.config().max_effect();
        let max_palette = self.strip.config().max_palette();
        let mut effect_applied = false;

        if let Some(segment) = self.strip.segment_mut(id) {
            let mut bri = segment.opacity;
            if apply_u8(record.get("bri"), &mut bri, 0, 255, host.rng) {
                if bri > 0 {
                    segment.opacity = bri;
                }
                segment.set_option(SegmentOption::On, bri > 0);
            }

            let on = apply_flag(record.get("on"), segment.option(SegmentOption::On));
            segment.set_option(SegmentOption::On, on);

            if record.get("reset").is_truthy() {
                host.renderer.reset_segment(id);
            }

            let frozen = apply_flag(record.get("frz"), segment.option(SegmentOption::Freeze));
            segment.set_option(SegmentOption::Freeze, frozen);

            if let Some(cct) = record.get("cct").integer::<u16>() {
                segment.cct = cct_from_input(cct);
            }

            if let Some(slots) = record.get("col").as_list() {
                let is_static = segment.mode == FX_MODE_STATIC;
                for (slot, element) in segment.colors.iter_mut().zip(slots) {
                    if let Some(color) = resolve_color_slot(element) {
                        *slot = color;
                        if is_static {
                            host.renderer.trigger();
                        }
                    }
                }
            }

            for (key, option) in [
                ("sel", SegmentOption::Selected),
                ("rev", SegmentOption::Reversed),
                ("rev2D", SegmentOption::Reversed2D),
                ("mi", SegmentOption::Mirror),
                ("rot2D", SegmentOption::Rotated2D),
            ] {
                if let Some(enabled) = record.get(key).as_bool() {
                    segment.set_option(option, enabled);
                }
            }

            let mut fx = segment.mode;
            if apply_u8(record.get("fx"), &mut fx, 1, max_effect, host.rng) {
                effect_applied = true;
                segment.mode = if fx > max_effect { FX_MODE_STATIC } else { fx };
            }

            apply_u8(record.get("sx"), &mut segment.speed, 0, 255, host.rng);
            apply_u8(record.get("ix"), &mut segment.intensity, 0, 255, host.rng);
            apply_u8(record.get("c1x"), &mut segment.custom1, 0, 255, host.rng);
            apply_u8(record.get("c2x"), &mut segment.custom2, 0, 255, host.rng);
            apply_u8(record.get("c3x"), &mut segment.custom3, 0, 255, host.rng);
            apply_u8(record.get("pal"), &mut segment.palette, 1, max_palette, host.rng);
        }

        if effect_applied && preset_id.is_none() {
            self.unload_playlist(host.services);
        }

        if let Some(items) = record.get("i").as_list() {
            self.apply_pixel_overrides(id, items, host.renderer);
        }

        if let Some(segment) = self.strip.segment(id) {
            if !(segment.differs(&prev) - SegmentDiff::Selection).is_empty() {
                self.state_changed = true;
            }
        }
    }

    /// Tile copies of `record` over consecutive slots, starting with `first_id`.
    ///
    /// Each copy is shifted by `len` and flips the reversed option. Copies continue
    /// while the next one starts inside the strip, so every LED ends up covered.
    fn replicate_segment(
        &mut self,
        record: &Record,
        first_id: u8,
        start: u16,
        len: u16,
        preset_id: Option<u8>,
        host: &mut Host<'_>,
    ) {
        let total = u32::from(self.strip.total_leds());
        let mut template = record.clone();
        for key in REPLICATION_FIELDS {
            template.remove(key);
        }
        let mut reversed = template.get("rev").as_bool().unwrap_or(false);

        let mut copy_start = u32::from(start);
        for id in first_id..self.strip.max_segments() {
            if id > first_id && copy_start >= total {
                break;
            }
            let copy_stop = copy_start + u32::from(len);
            // configure_segment cuts the last copy at the strip end
            let Ok(start) = u16::try_from(copy_start) else {
                break;
            };
            let stop = u16::try_from(copy_stop).unwrap_or(u16::MAX);
            reversed = !reversed;

            let mut replica = template.clone();
            replica.insert("start", start);
            replica.insert("stop", stop);
            replica.insert("rev", reversed);
            debug!("Replicating segment {first_id} into slot {id}: {start}..{stop}");
            self.merge_segment(&replica, id, preset_id, host);

            copy_start = copy_stop;
        }
    }
}
