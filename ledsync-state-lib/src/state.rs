//! Device state and the top-level merge
//!
//! [`DeviceState::merge`] applies one request document. Field handling follows
//! a fixed precedence: brightness and power first, then timing, sub-objects and
//! realtime control, then segments, and finally presets and playlists. Segment
//! changes are tracked in `state_changed` and reported once per request through
//! [`Services::state_updated`].

use log::{debug, info};
use rand::RngCore;
use smallvec::SmallVec;

use crate::coerce::{apply_u8, coerce_u8};
use crate::config::StripConfig;
use crate::host::{CallMode, Host, Renderer, Services};
use crate::realtime::{Realtime, RealtimeMode, RealtimeOverride, LIVE_TIMEOUT_MS};
use crate::segment::SegmentOption;
use crate::serialize::{state_snapshot, SerializeOptions};
use crate::strip::Strip;
use crate::value::{Record, Value};

/// Default global brightness after boot.
pub const DEFAULT_BRIGHTNESS: u8 = 128;

/// Default transition duration in milliseconds.
pub const DEFAULT_TRANSITION_MS: u32 = 700;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PresetOp {
    None,
    Save(u8),
    Delete(u8),
    Load(u8),
}

/// Timed dim-to-target state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nightlight {
    pub active: bool,
    pub delay_mins: u8,
    pub mode: u8,
    pub target_bri: u8,
    /// Milliseconds timestamp at which the nightlight was switched on
    pub started_at_ms: u32,
}

impl Default for Nightlight {
    fn default() -> Self {
        Self {
            active: false,
            delay_mins: 60,
            mode: 1,
            target_bri: 0,
            started_at_ms: 0,
        }
    }
}

impl Nightlight {
    /// Whole seconds left until the target brightness is reached, or `None` when inactive.
    #[must_use]
    pub fn remaining_secs(&self, now_ms: u32) -> Option<u32> {
        if !self.active {
            return None;
        }
        let total_ms = u32::from(self.delay_mins) * 60_000;
        let elapsed = now_ms.wrapping_sub(self.started_at_ms);
        Some(total_ms.saturating_sub(elapsed) / 1000)
    }
}

#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)] // Independent device flags mirrored from the wire format
pub struct DeviceState {
    pub strip: Strip,
    /// Global brightness; 0 = off
    pub bri: u8,
    /// Last non-zero brightness, restored when switching on
    pub bri_last: u8,
    /// Audio input gain
    pub input_level: u8,
    /// Persistent transition duration (ms)
    pub transition_delay: u32,
    /// Duration in effect for the current change (ms)
    pub transition_delay_temp: u32,
    /// `transition_delay_temp` reverts after the next state update
    pub transition_once: bool,
    pub timebase: u32,
    pub nightlight: Nightlight,
    pub notify_direct: bool,
    pub receive_notifications: bool,
    pub realtime: Realtime,
    pub current_preset: Option<u8>,
    pub current_playlist: Option<u8>,
    /// Position of `ps` cycling within the configured preset bounds
    pub preset_cycle: u8,
    pub presets_modified_time: u32,
    pub do_reboot: bool,
    pub load_ledmap: Option<u8>,
    /// Something other than the segment selection changed during this request
    pub state_changed: bool,
    /// Pending interface refresh requested by the last merge
    pub interface_update: Option<CallMode>,
}

impl DeviceState {
    #[must_use]
    pub fn new(config: StripConfig) -> Self {
        let strip = Strip::new(config);
        let preset_cycle = strip.config().preset_cycle_min;
        Self {
            strip,
            bri: DEFAULT_BRIGHTNESS,
            bri_last: DEFAULT_BRIGHTNESS,
            input_level: 128,
            transition_delay: DEFAULT_TRANSITION_MS,
            transition_delay_temp: DEFAULT_TRANSITION_MS,
            transition_once: false,
            timebase: 0,
            nightlight: Nightlight::default(),
            notify_direct: false,
            receive_notifications: true,
            realtime: Realtime::default(),
            current_preset: None,
            current_playlist: None,
            preset_cycle,
            presets_modified_time: 0,
            do_reboot: false,
            load_ledmap: None,
            state_changed: false,
            interface_update: None,
        }
    }

    /// Switch between off and the last used brightness.
    pub fn toggle_on_off(&mut self) {
        if self.bri == 0 {
            self.bri = self.bri_last;
        } else {
            self.bri_last = self.bri;
            self.bri = 0;
        }
    }

    pub fn unload_playlist(&mut self, services: &mut dyn Services) {
        if self.current_playlist.take().is_some() {
            debug!("Stopping playlist");
            services.unload_playlist();
        }
    }

    /// Interface refresh requested since the last call, if any.
    pub fn take_interface_update(&mut self) -> Option<CallMode> {
        self.interface_update.take()
    }

    /// Merge a request document into the device state.
    ///
    /// `preset_id` is set when the document is a stored preset being applied.
    /// Returns whether the caller asked for the full state in the response (`"v"`).
    pub fn merge(&mut self, request: &Record, mut call_mode: CallMode, preset_id: Option<u8>, host: &mut Host<'_>) -> bool {
        let state_response = request.get("v").as_bool().unwrap_or(false);

        let bri_before = self.bri;
        apply_u8(request.get("bri"), &mut self.bri, 0, 255, host.rng);
        apply_u8(request.get("inputLevel"), &mut self.input_level, 0, 255, host.rng);

        let on = request.get("on").as_bool().unwrap_or(self.bri > 0);
        if on != (self.bri > 0) {
            self.toggle_on_off();
        }
        if request.get("on").is_toggle() {
            self.toggle_on_off();
        }
        if self.bri != bri_before {
            self.state_changed = true;
        }

        if self.bri > 0 && bri_before == 0 {
            self.strip.unfreeze_all();
            if self.realtime.is_active()
                && self.realtime.override_level == RealtimeOverride::None
                && self.strip.config().use_main_segment_only
            {
                self.strip.main_segment_mut().set_option(SegmentOption::Freeze, true);
            }
        }

        self.merge_timing(request, preset_id, host.renderer);
        self.merge_sub_objects(request, &mut call_mode, host);
        self.merge_realtime(request, host.renderer);

        // a preset load replaces whatever segments this request carries
        let preset_op = self.resolve_preset_op(request, host.rng);
        if !matches!(preset_op, PresetOp::Load(_)) {
            self.merge_segments(request, preset_id, host);
        }

        host.services.read_extension_state(request);

        if let Some(ledmap) = request.get("ledmap").integer::<u8>() {
            self.load_ledmap = Some(ledmap);
        }

        if self.run_preset_op(preset_op, request, call_mode, preset_id, host) {
            return state_response;
        }

        match request.get("playlist").as_record() {
            Some(playlist) if host.services.load_playlist(playlist, preset_id) => {
                info!("Playlist started");
                self.current_playlist = Some(preset_id.unwrap_or(0));
                // the first playlist entry notifies
                call_mode = if request.get("on").is_absent() {
                    CallMode::NoNotify
                } else {
                    CallMode::DirectChange
                };
            }
            _ => self.interface_update = Some(CallMode::WsSend),
        }

        self.state_updated(call_mode, preset_id, host);
        state_response
    }

    /// `transition`, `tt` and `tb`.
    fn merge_timing(&mut self, request: &Record, preset_id: Option<u8>, renderer: &mut dyn Renderer) {
        let mut commit = false;

        // playlists own the transition while they run
        if preset_id.is_none() || self.current_playlist.is_none() {
            if let Some(tenths) = request.get("transition").integer::<u32>() {
                self.transition_delay = tenths.saturating_mul(100);
                self.transition_delay_temp = self.transition_delay;
                commit = true;
            }
        }
        if let Some(tenths) = request.get("tt").integer::<u32>() {
            self.transition_delay_temp = tenths.saturating_mul(100);
            self.transition_once = true;
            commit = true;
        }
        if commit {
            renderer.set_transition(self.transition_delay_temp);
        }

        if let Some(timebase) = request.get("tb").integer::<u32>() {
            self.timebase = timebase.wrapping_sub(renderer.now_ms());
        }
    }

    /// `nl`, `udpn`, `time`, `rb` and `mainseg`.
    fn merge_sub_objects(&mut self, request: &Record, call_mode: &mut CallMode, host: &mut Host<'_>) {
        if let Some(nl) = request.get("nl").as_record() {
            let was_active = self.nightlight.active;
            let light = &mut self.nightlight;
            light.active = nl.get("on").as_bool().unwrap_or(light.active);
            light.delay_mins = nl.get("dur").integer::<u8>().unwrap_or(light.delay_mins);
            light.mode = nl.get("mode").integer::<u8>().unwrap_or(light.mode);
            light.target_bri = nl.get("tbri").integer::<u8>().unwrap_or(light.target_bri);
            if light.active && !was_active {
                light.started_at_ms = host.renderer.now_ms();
            }
        }

        if let Some(udpn) = request.get("udpn").as_record() {
            self.notify_direct = udpn.get("send").as_bool().unwrap_or(self.notify_direct);
            self.receive_notifications = udpn
                .get("recv")
                .as_bool()
                .unwrap_or(self.receive_notifications);
            if udpn.get("nn").is_truthy() {
                *call_mode = CallMode::NoNotify;
            }
        }

        if let Some(epoch_secs) = request.get("time").integer::<u32>() {
            host.services.set_time(epoch_secs);
            if self.presets_modified_time == 0 {
                self.presets_modified_time = epoch_secs;
            }
        }

        if let Some(reboot) = request.get("rb").as_bool() {
            self.do_reboot = reboot;
        }

        // must run before the realtime lock so the right segment is frozen
        if let Some(id) = request.get("mainseg").integer::<u8>() {
            self.strip.set_main_segment(id);
        }
    }

    /// `lor` and `live`.
    fn merge_realtime(&mut self, request: &Record, renderer: &mut dyn Renderer) {
        if let Some(level) = request.get("lor").integer::<u8>() {
            self.realtime.override_level = RealtimeOverride::from_level(level);
        }
        if self.realtime.is_active() && self.strip.config().use_main_segment_only {
            let frozen = self.realtime.override_level == RealtimeOverride::None;
            self.strip.main_segment_mut().set_option(SegmentOption::Freeze, frozen);
        }

        if request.contains("live") {
            if request.get("live").is_truthy() {
                self.transition_delay_temp = 0;
                self.transition_once = true;
                self.realtime_lock(LIVE_TIMEOUT_MS, RealtimeMode::Generic, renderer);
            } else {
                self.exit_realtime(renderer);
            }
        }
    }

    /// `seg`: one record for the selection (or an explicit id), or a list by position.
    fn merge_segments(&mut self, request: &Record, preset_id: Option<u8>, host: &mut Host<'_>) {
        match request.get("seg") {
            Value::Record(segment) => {
                let explicit = matches!(segment.get("id"), Value::Integer(n) if *n >= 0);
                if explicit {
                    self.merge_segment(segment, 0, preset_id, host);
                    return;
                }
                let mut targets: SmallVec<[u8; 16]> = self
                    .strip
                    .active_ids()
                    .filter(|&id| self.strip.segments()[usize::from(id)].is_selected())
                    .collect();
                if targets.is_empty() {
                    targets.push(self.strip.main_segment_id());
                }
                for id in targets {
                    self.merge_segment(segment, id, preset_id, host);
                }
            }
            Value::List(segments) => {
                for (position, item) in segments.iter().enumerate() {
                    let Ok(id) = u8::try_from(position) else {
                        break;
                    };
                    if let Some(segment) = item.as_record() {
                        self.merge_segment(segment, id, preset_id, host);
                    }
                }
            }
            _ => {}
        }
    }

    /// Pick the preset operation of this request.
    ///
    /// At most one runs, in priority order `psave`, `pdel`, `ps`.
    fn resolve_preset_op(&self, request: &Record, rng: &mut dyn RngCore) -> PresetOp {
        if let Some(id) = request.get("psave").integer::<u8>().filter(|&id| id > 0) {
            return PresetOp::Save(id);
        }
        if let Some(id) = request.get("pdel").integer::<u8>().filter(|&id| id > 0) {
            return PresetOp::Delete(id);
        }
        let config = self.strip.config();
        coerce_u8(
            request.get("ps"),
            self.preset_cycle,
            config.preset_cycle_min,
            config.preset_cycle_max,
            rng,
        )
        .filter(|&id| id > 0)
        .map_or(PresetOp::None, PresetOp::Load)
    }

    /// Run the preset operation and `win`; returns `true` when a preset load ends the request.
    fn run_preset_op(
        &mut self,
        op: PresetOp,
        request: &Record,
        call_mode: CallMode,
        preset_id: Option<u8>,
        host: &mut Host<'_>,
    ) -> bool {
        match op {
            PresetOp::Save(id) => {
                let options = SerializeOptions {
                    for_preset: true,
                    include_bri: request.get("ib").as_bool().unwrap_or(true),
                    segment_bounds: request.get("sb").as_bool().unwrap_or(true),
                };
                let snapshot = state_snapshot(self, options, host.renderer.now_ms());
                info!("Saving preset {id}");
                host.services.save_preset(id, request, snapshot);
                return false;
            }
            PresetOp::Load(id) => {
                if preset_id.is_none() {
                    self.unload_playlist(host.services);
                }
                let config = self.strip.config();
                if (config.preset_cycle_min..=config.preset_cycle_max).contains(&id) {
                    self.preset_cycle = id;
                }
                debug!("Applying preset {id}");
                host.services.apply_preset(id, call_mode);
                return true;
            }
            PresetOp::Delete(id) => {
                info!("Deleting preset {id}");
                host.services.delete_preset(id);
            }
            PresetOp::None => {}
        }

        if let Some(command) = request.get("win").as_str() {
            host.services.handle_command(&format!("win&{command}"));
        }
        false
    }

    /// Finish a request: report the change once and end one-shot transitions.
    pub fn state_updated(&mut self, call_mode: CallMode, preset_id: Option<u8>, host: &mut Host<'_>) {
        let changed = self.state_changed;
        if self.bri > 0 {
            self.bri_last = self.bri;
        }
        if let Some(id) = preset_id {
            self.current_preset = Some(id);
        } else if changed {
            self.current_preset = None;
        }
        host.services.state_updated(call_mode, changed);
        self.state_changed = false;

        if self.transition_once {
            self.transition_once = false;
            self.transition_delay_temp = self.transition_delay;
            host.renderer.set_transition(self.transition_delay_temp);
        }
    }
}
