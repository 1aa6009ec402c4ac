//! State documents
//!
//! Field order matches what existing clients expect, so every document is a
//! derived `Serialize` struct rather than a map. Color slots are written as
//! 3- or 4-element arrays depending on whether the strip has a white channel.

use std::io;

use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;

use crate::color::Rgbw;
use crate::host::Renderer;
use crate::segment::{Segment, SegmentOption};
use crate::state::DeviceState;

/// Most LEDs sampled for a live preview.
pub const MAX_LIVE_LEDS: u16 = 180;

/// Which parts of the state to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Omit live-only fields and write `{"stop":0}` for unused slots
    pub for_preset: bool,
    /// Include on/brightness/transition
    pub include_bri: bool,
    /// Include segment bounds and names
    pub segment_bounds: bool,
}

impl SerializeOptions {
    /// Full state as answered to clients.
    pub const LIVE: Self = Self {
        for_preset: false,
        include_bri: true,
        segment_bounds: true,
    };
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self::LIVE
    }
}

struct ColorSlots<'a> {
    colors: &'a [Rgbw; 3],
    white: bool,
}

impl Serialize for ColorSlots<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let width = if self.white { 4 } else { 3 };
        let mut seq = serializer.serialize_seq(Some(self.colors.len()))?;
        for color in self.colors {
            seq.serialize_element(&color.channels()[..width])?;
        }
        seq.end()
    }
}

#[derive(Serialize)]
struct NightlightDoc {
    on: bool,
    dur: u8,
    mode: u8,
    tbri: u8,
    rem: i64,
}

#[derive(Serialize)]
struct SyncDoc {
    send: bool,
    recv: bool,
}

#[derive(Serialize)]
struct SegmentDoc<'a> {
    id: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    len: Option<u16>,
    grp: u8,
    spc: u8,
    of: u16,
    on: bool,
    frz: bool,
    bri: u8,
    cct: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<&'a str>,
    col: ColorSlots<'a>,
    fx: u8,
    sx: u8,
    ix: u8,
    c1x: u8,
    c2x: u8,
    c3x: u8,
    pal: u8,
    sel: bool,
    rev: bool,
    #[serde(rename = "rev2D")]
    rev_2d: bool,
    mi: bool,
    #[serde(rename = "rot2D")]
    rot_2d: bool,
}

#[derive(Serialize)]
struct DisabledDoc {
    stop: u16,
}

#[derive(Serialize)]
#[serde(untagged)]
enum SegmentEntry<'a> {
    Full(Box<SegmentDoc<'a>>),
    Disabled(DisabledDoc),
}

#[derive(Serialize)]
struct StateDoc<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bri: Option<u8>,
    #[serde(rename = "inputLevel", skip_serializing_if = "Option::is_none")]
    input_level: Option<u8>,
    /// In 100 ms units
    #[serde(skip_serializing_if = "Option::is_none")]
    transition: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ps: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pl: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nl: Option<NightlightDoc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    udpn: Option<SyncDoc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lor: Option<u8>,
    mainseg: u8,
    seg: Vec<SegmentEntry<'a>>,
}

#[derive(Serialize)]
struct LiveLedsDoc {
    leds: Vec<String>,
    n: u16,
}

fn segment_doc<'a>(id: u8, segment: &'a Segment, options: SerializeOptions, white: bool) -> SegmentDoc<'a> {
    let bounds = options.segment_bounds;
    SegmentDoc {
        id,
        start: bounds.then_some(segment.start),
        stop: bounds.then_some(segment.stop),
        len: (!options.for_preset).then(|| segment.length()),
        grp: segment.grouping,
        spc: segment.spacing,
        of: segment.offset,
        on: segment.option(SegmentOption::On),
        frz: segment.option(SegmentOption::Freeze),
        bri: if segment.opacity > 0 { segment.opacity } else { 255 },
        cct: segment.cct,
        n: if bounds {
            segment.name.as_ref().map(|name| name.as_str())
        } else {
            None
        },
        col: ColorSlots {
            colors: &segment.colors,
            white,
        },
        fx: segment.mode,
        sx: segment.speed,
        ix: segment.intensity,
        c1x: segment.custom1,
        c2x: segment.custom2,
        c3x: segment.custom3,
        pal: segment.palette,
        sel: segment.is_selected(),
        rev: segment.option(SegmentOption::Reversed),
        rev_2d: segment.option(SegmentOption::Reversed2D),
        mi: segment.option(SegmentOption::Mirror),
        rot_2d: segment.option(SegmentOption::Rotated2D),
    }
}

fn state_doc(state: &DeviceState, options: SerializeOptions, now_ms: u32) -> StateDoc<'_> {
    let white = state.strip.config().white_channel;
    let live = !options.for_preset;
    let bri = options.include_bri;

    let seg = state
        .strip
        .segments()
        .iter()
        .zip(0u8..)
        .filter_map(|(segment, id)| {
            if segment.is_active() {
                Some(SegmentEntry::Full(Box::new(segment_doc(id, segment, options, white))))
            } else if options.for_preset && options.segment_bounds {
                Some(SegmentEntry::Disabled(DisabledDoc { stop: 0 }))
            } else {
                None
            }
        })
        .collect();

    StateDoc {
        on: bri.then_some(state.bri > 0),
        bri: bri.then_some(state.bri_last),
        input_level: bri.then_some(state.input_level),
        transition: bri.then_some(state.transition_delay / 100),
        ps: live.then(|| state.current_preset.map_or(-1, i16::from)),
        pl: live.then(|| state.current_playlist.map_or(-1, i16::from)),
        nl: live.then(|| NightlightDoc {
            on: state.nightlight.active,
            dur: state.nightlight.delay_mins,
            mode: state.nightlight.mode,
            tbri: state.nightlight.target_bri,
            rem: state
                .nightlight
                .remaining_secs(now_ms)
                .map_or(-1, i64::from),
        }),
        udpn: live.then(|| SyncDoc {
            send: state.notify_direct,
            recv: state.receive_notifications,
        }),
        lor: live.then(|| state.realtime.override_level.level()),
        mainseg: state.strip.main_segment_id(),
        seg,
    }
}

/// Write the state document to `writer`.
pub fn write_state<W: io::Write>(
    state: &DeviceState,
    options: SerializeOptions,
    now_ms: u32,
    writer: W,
) -> serde_json::Result<()> {
    serde_json::to_writer(writer, &state_doc(state, options, now_ms))
}

/// The state document as a JSON value, as stored in presets.
#[must_use]
pub fn state_snapshot(state: &DeviceState, options: SerializeOptions, now_ms: u32) -> serde_json::Value {
    serde_json::to_value(state_doc(state, options, now_ms)).unwrap_or_default()
}

/// Write a sampled preview of the current pixel colors: `{"leds":["RRGGBB",...],"n":step}`.
///
/// Every `n`th LED is sampled so at most [`MAX_LIVE_LEDS`] entries are written.
/// The white channel is folded into RGB.
pub fn write_live_leds<W: io::Write>(total_leds: u16, renderer: &dyn Renderer, writer: W) -> serde_json::Result<()> {
    let step = total_leds.saturating_sub(1) / MAX_LIVE_LEDS + 1;
    let leds = (0..total_leds)
        .step_by(usize::from(step))
        .map(|index| {
            let rgb = renderer.pixel_color(index).to_rgb_with_white();
            hex::encode_upper([rgb.r, rgb.g, rgb.b])
        })
        .collect();
    serde_json::to_writer(writer, &LiveLedsDoc { leds, n: step })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StripConfig;
    use crate::host::testing::{Harness, Recorder};
    use crate::host::CallMode;
    use crate::segment::SegmentName;
    use crate::value::record_from_json;
    use serde_json::{json, Value as Json};

    fn state(white: bool) -> DeviceState {
        DeviceState::new(StripConfig {
            total_leds: 30,
            max_segments: 4,
            white_channel: white,
            ..StripConfig::default()
        })
    }

    fn to_json(state: &DeviceState, options: SerializeOptions) -> Json {
        let mut out = Vec::new();
        write_state(state, options, 0, &mut out).unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn test_live_document_shape() {
        let state = state(false);
        let doc = to_json(&state, SerializeOptions::LIVE);
        let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            ["on", "bri", "inputLevel", "transition", "ps", "pl", "nl", "udpn", "lor", "mainseg", "seg"]
        );
        assert_eq!(doc["ps"], -1);
        assert_eq!(doc["transition"], 7);
        assert_eq!(doc["nl"]["rem"], -1);

        let seg = &doc["seg"];
        assert_eq!(seg.as_array().unwrap().len(), 1);
        assert_eq!(seg[0]["len"], 30);
        assert_eq!(seg[0]["col"], json!([[255, 160, 0], [0, 0, 0], [0, 0, 0]]));
        assert!(seg[0].get("n").is_none());
    }

    #[test]
    fn test_segment_field_order() {
        let state = state(false);
        let doc = to_json(&state, SerializeOptions::LIVE);
        let keys: Vec<_> = doc["seg"][0].as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            [
                "id", "start", "stop", "len", "grp", "spc", "of", "on", "frz", "bri", "cct", "col", "fx", "sx", "ix",
                "c1x", "c2x", "c3x", "pal", "sel", "rev", "rev2D", "mi", "rot2D"
            ]
        );
    }

    #[test]
    fn test_white_channel_arrays() {
        let mut state = state(true);
        state.strip.segment_mut(0).unwrap().colors[0] = Rgbw::new(1, 2, 3, 4);
        let doc = to_json(&state, SerializeOptions::LIVE);
        assert_eq!(doc["seg"][0]["col"][0], json!([1, 2, 3, 4]));
        assert_eq!(doc["seg"][0]["col"][1], json!([0, 0, 0, 0]));
    }

    #[test]
    fn test_preset_document() {
        let mut state = state(false);
        state.strip.segment_mut(0).unwrap().name = SegmentName::new("Couch");
        let options = SerializeOptions {
            for_preset: true,
            include_bri: false,
            segment_bounds: true,
        };
        let doc = state_snapshot(&state, options, 0);
        assert!(doc.get("bri").is_none());
        assert!(doc.get("ps").is_none());
        assert!(doc.get("nl").is_none());
        assert_eq!(doc["mainseg"], 0);

        let seg = doc["seg"].as_array().unwrap();
        assert_eq!(seg.len(), 4);
        assert!(seg[0].get("len").is_none());
        assert_eq!(seg[0]["n"], "Couch");
        assert_eq!(seg[1], json!({"stop": 0}));
    }

    #[test]
    fn test_preset_without_bounds_skips_unused_slots() {
        let state = state(false);
        let options = SerializeOptions {
            for_preset: true,
            include_bri: true,
            segment_bounds: false,
        };
        let doc = state_snapshot(&state, options, 0);
        let seg = doc["seg"].as_array().unwrap();
        assert_eq!(seg.len(), 1);
        assert!(seg[0].get("start").is_none());
    }

    #[test]
    fn test_round_trip() {
        let mut original = state(true);
        let mut harness = Harness::new(30);
        let request = record_from_json(json!({
            "seg": [
                {"start": 0, "stop": 12, "grp": 2, "spc": 1, "of": 3, "n": "Left", "col": [[1, 2, 3, 4], "00FF00", [9, 9, 9]],
                 "fx": 12, "sx": 40, "ix": 50, "c1x": 1, "c2x": 2, "c3x": 3, "pal": 6, "rev": true, "mi": true, "cct": 90},
                {"start": 12, "stop": 30, "bri": 77, "on": false, "frz": true, "sel": true, "rev2D": true, "rot2D": true}
            ]
        }));
        original.merge(&request, CallMode::DirectChange, None, &mut harness.host());

        let doc = to_json(&original, SerializeOptions::LIVE);
        let replay = record_from_json(json!({ "seg": doc["seg"].clone() }));
        let mut copy = state(true);
        copy.merge(&replay, CallMode::DirectChange, None, &mut Harness::new(30).host());

        assert_eq!(copy.strip.segments(), original.strip.segments());
    }

    #[test]
    fn test_live_leds() {
        let mut renderer = Recorder::with_leds(3);
        renderer.pixels[0] = Rgbw::new(255, 0, 0, 0);
        renderer.pixels[1] = Rgbw::new(10, 20, 30, 250);
        let mut out = Vec::new();
        write_live_leds(3, &renderer, &mut out).unwrap();
        let doc: Json = serde_json::from_slice(&out).unwrap();
        assert_eq!(doc, json!({"leds": ["FF0000", "FFFFFF", "000000"], "n": 1}));
    }

    #[test]
    fn test_live_leds_sampling() {
        let renderer = Recorder::with_leds(400);
        let mut out = Vec::new();
        write_live_leds(400, &renderer, &mut out).unwrap();
        let doc: Json = serde_json::from_slice(&out).unwrap();
        assert_eq!(doc["n"], 3);
        assert_eq!(doc["leds"].as_array().unwrap().len(), 134);
    }
}
