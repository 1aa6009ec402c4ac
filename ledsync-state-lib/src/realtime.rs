//! Realtime sessions
//!
//! While a realtime source is active its pixel data overrides the effect
//! renderer, either on the main segment only or on the whole strip.

use log::{debug, info};

use crate::color::Rgbw;
use crate::host::{CallMode, Renderer};
use crate::segment::SegmentOption;
use crate::state::DeviceState;

/// Session length armed by `"live": true`.
pub const LIVE_TIMEOUT_MS: u32 = 65_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RealtimeMode {
    #[default]
    Inactive,
    /// Pixel data pushed through the JSON API
    Generic,
}

/// Whether local effects win over an active realtime source (`lor`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RealtimeOverride {
    #[default]
    None,
    /// Until the current session ends
    Once,
    Always,
}

impl RealtimeOverride {
    /// Levels above 2 clamp to [`RealtimeOverride::Always`].
    #[must_use]
    pub const fn from_level(level: u8) -> Self {
        match level {
            0 => Self::None,
            1 => Self::Once,
            _ => Self::Always,
        }
    }

    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Once => 1,
            Self::Always => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Realtime {
    pub mode: RealtimeMode,
    pub override_level: RealtimeOverride,
    locked_at_ms: u32,
    timeout_ms: u32,
}

impl Realtime {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.mode != RealtimeMode::Inactive
    }

    fn expired(&self, now_ms: u32) -> bool {
        self.is_active() && now_ms.wrapping_sub(self.locked_at_ms) >= self.timeout_ms
    }
}

impl DeviceState {
    /// Start (or extend) a realtime session of `timeout_ms`.
    pub fn realtime_lock(&mut self, timeout_ms: u32, mode: RealtimeMode, renderer: &mut dyn Renderer) {
        let starting = !self.realtime.is_active() && self.realtime.override_level == RealtimeOverride::None;
        if starting {
            info!("Realtime session started ({timeout_ms} ms)");
            if self.strip.config().use_main_segment_only {
                self.strip.main_segment_mut().set_option(SegmentOption::Freeze, true);
            } else {
                renderer.fill_strip(Rgbw::BLACK);
            }
            if self.bri == 0 {
                renderer.set_brightness(self.bri_last, true);
            }
        }
        self.realtime.locked_at_ms = renderer.now_ms();
        self.realtime.timeout_ms = timeout_ms;
        self.realtime.mode = mode;
    }

    /// End the realtime session, if any, and hand the strip back to the effects.
    pub fn exit_realtime(&mut self, renderer: &mut dyn Renderer) {
        if !self.realtime.is_active() {
            return;
        }
        info!("Realtime session ended");
        if self.realtime.override_level == RealtimeOverride::Once {
            self.realtime.override_level = RealtimeOverride::None;
        }
        renderer.set_brightness(self.bri, true);
        self.realtime.timeout_ms = 0;
        if self.strip.config().use_main_segment_only {
            self.strip.main_segment_mut().set_option(SegmentOption::Freeze, false);
        }
        self.realtime.mode = RealtimeMode::Inactive;
        self.interface_update = Some(CallMode::WsSend);
        renderer.trigger();
    }

    /// Expire a timed-out realtime session. Call periodically.
    pub fn tick(&mut self, renderer: &mut dyn Renderer) {
        if self.realtime.expired(renderer.now_ms()) {
            debug!("Realtime session timed out");
            self.exit_realtime(renderer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StripConfig;
    use crate::host::testing::{Call, Recorder};

    fn state(main_only: bool) -> DeviceState {
        DeviceState::new(StripConfig {
            total_leds: 20,
            use_main_segment_only: main_only,
            ..StripConfig::default()
        })
    }

    #[test]
    fn test_override_levels() {
        assert_eq!(RealtimeOverride::from_level(0), RealtimeOverride::None);
        assert_eq!(RealtimeOverride::from_level(1), RealtimeOverride::Once);
        assert_eq!(RealtimeOverride::from_level(9), RealtimeOverride::Always);
        assert_eq!(RealtimeOverride::Always.level(), 2);
    }

    #[test]
    fn test_lock_blanks_strip() {
        let mut state = state(false);
        let mut renderer = Recorder::with_leds(20);
        state.realtime_lock(LIVE_TIMEOUT_MS, RealtimeMode::Generic, &mut renderer);
        assert!(state.realtime.is_active());
        assert!(renderer.has(&Call::FillStrip(Rgbw::BLACK)));
    }

    #[test]
    fn test_lock_freezes_main_segment() {
        let mut state = state(true);
        let mut renderer = Recorder::with_leds(20);
        state.realtime_lock(LIVE_TIMEOUT_MS, RealtimeMode::Generic, &mut renderer);
        assert!(state.strip.main_segment().option(SegmentOption::Freeze));
        assert!(!renderer.has(&Call::FillStrip(Rgbw::BLACK)));

        state.exit_realtime(&mut renderer);
        assert!(!state.realtime.is_active());
        assert!(!state.strip.main_segment().option(SegmentOption::Freeze));
    }

    #[test]
    fn test_lock_wakes_dark_strip() {
        let mut state = state(false);
        state.bri = 0;
        state.bri_last = 90;
        let mut renderer = Recorder::with_leds(20);
        state.realtime_lock(LIVE_TIMEOUT_MS, RealtimeMode::Generic, &mut renderer);
        assert!(renderer.has(&Call::Brightness(90, true)));
    }

    #[test]
    fn test_exit_clears_one_shot_override() {
        let mut state = state(false);
        let mut renderer = Recorder::with_leds(20);
        state.realtime_lock(LIVE_TIMEOUT_MS, RealtimeMode::Generic, &mut renderer);
        state.realtime.override_level = RealtimeOverride::Once;
        state.exit_realtime(&mut renderer);
        assert_eq!(state.realtime.override_level, RealtimeOverride::None);
        assert_eq!(state.interface_update, Some(CallMode::WsSend));
    }

    #[test]
    fn test_tick_expires_session() {
        let mut state = state(false);
        let mut renderer = Recorder::with_leds(20);
        renderer.now = 1_000;
        state.realtime_lock(LIVE_TIMEOUT_MS, RealtimeMode::Generic, &mut renderer);

        renderer.now = 1_000 + LIVE_TIMEOUT_MS - 1;
        state.tick(&mut renderer);
        assert!(state.realtime.is_active());

        renderer.now = 1_000 + LIVE_TIMEOUT_MS;
        state.tick(&mut renderer);
        assert!(!state.realtime.is_active());
    }
}
