//! Collaborator contracts
//!
//! The merge engine never draws pixels, stores presets or talks to the network
//! itself. It reaches those through the two traits below, which a host (firmware,
//! simulator or test) implements.

use rand::RngCore;
use serde_json::Value as Json;

use crate::color::Rgbw;
use crate::segment::Segment;
use crate::value::Record;

/// Origin of a state change, forwarded to the notification collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallMode {
    /// Initial boot
    Init,
    /// Direct request from a client (notifies peers)
    #[default]
    DirectChange,
    /// Received from a sync peer
    Notification,
    /// Physical button or IR input
    Button,
    /// Change that must not notify peers
    NoNotify,
    /// Update only the websocket clients
    WsSend,
}

/// Pixel output and effect runtime.
pub trait Renderer {
    /// Milliseconds since boot (wrapping).
    fn now_ms(&self) -> u32;

    /// Redraw as soon as possible, even when the current effect is static.
    fn trigger(&mut self);

    /// Duration used for color and brightness transitions from now on.
    fn set_transition(&mut self, duration_ms: u32);

    /// Commit the global brightness; `direct` skips the transition.
    fn set_brightness(&mut self, bri: u8, direct: bool);

    /// Segment `id` changed geometry; `previous` is the old `[start, stop)` range to blank.
    fn segment_changed(&mut self, id: u8, previous: (u16, u16));

    /// Restart the effect runtime of segment `id`.
    fn reset_segment(&mut self, id: u8);

    fn fill_segment(&mut self, segment: &Segment, color: Rgbw);

    /// Set one pixel of `segment` by virtual index.
    fn set_pixel(&mut self, segment: &Segment, index: u16, color: Rgbw);

    fn fill_strip(&mut self, color: Rgbw);

    /// Current color of physical LED `index`.
    fn pixel_color(&self, index: u16) -> Rgbw;
}

/// Storage, playlist, extension and notification services.
///
/// Every method defaults to a no-op so hosts only implement what they have.
pub trait Services {
    /// Store `snapshot` under preset `id`; `request` carries the naming fields.
    fn save_preset(&mut self, id: u8, request: &Record, snapshot: Json) {
        let _ = (id, request, snapshot);
    }

    fn delete_preset(&mut self, id: u8) {
        let _ = id;
    }

    /// Apply preset `id`. Hosts may defer this until the current request completes.
    fn apply_preset(&mut self, id: u8, mode: CallMode) {
        let _ = (id, mode);
    }

    /// Start the playlist in `playlist`; returns whether one was loaded.
    fn load_playlist(&mut self, playlist: &Record, preset_id: Option<u8>) -> bool {
        let _ = (playlist, preset_id);
        false
    }

    fn unload_playlist(&mut self) {}

    /// Hand the whole request to extension modules.
    fn read_extension_state(&mut self, request: &Record) {
        let _ = request;
    }

    /// Execute a legacy `key=value&...` command string.
    fn handle_command(&mut self, command: &str) {
        let _ = command;
    }

    /// Wall-clock time from the client, in epoch seconds.
    fn set_time(&mut self, epoch_secs: u32) {
        let _ = epoch_secs;
    }

    /// Called once per merged request after all fields were applied.
    fn state_updated(&mut self, mode: CallMode, changed: bool) {
        let _ = (mode, changed);
    }
}

/// Everything a merge call may touch outside [`crate::DeviceState`].
pub struct Host<'a> {
    pub renderer: &'a mut dyn Renderer,
    pub services: &'a mut dyn Services,
    pub rng: &'a mut dyn RngCore,
}

impl<'a> Host<'a> {
    pub fn new(
        renderer: &'a mut dyn Renderer,
        services: &'a mut dyn Services,
        rng: &'a mut dyn RngCore,
    ) -> Self {
        Self {
            renderer,
            services,
            rng,
        }
    }
}
