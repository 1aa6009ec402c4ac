//! JSON state synchronization for addressable LED controllers
//!
//! This library merges partial JSON state requests into a device model (global
//! settings plus a fixed table of LED segments) and writes that model back out
//! in the same wire format. It is hardware-agnostic: rendering, preset storage
//! and notifications are reached through the traits in [`host`], so the whole
//! merge can be tested without LEDs attached.

pub mod api;
pub mod buffer;
pub mod coerce;
pub mod color;
pub mod config;
pub mod host;
pub mod pixels;
pub mod realtime;
pub mod segment;
pub mod serialize;
pub mod state;
pub mod strip;
pub mod value;

pub use api::{ApiError, JsonApi};
pub use color::{Rgbw, RGB8};
pub use config::StripConfig;
pub use host::{CallMode, Host, Renderer, Services};
pub use segment::{Segment, SegmentOption};
pub use state::DeviceState;
pub use value::{Record, Value};
