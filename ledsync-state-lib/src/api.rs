//! Request entry points
//!
//! Each entry point holds the scratch buffer for its whole duration, so state
//! requests, state reads and previews never interleave. The guard is released on
//! every return path, including early preset loads and parse errors.

use std::time::Duration;

use derive_more::{Display, Error, From};
use log::debug;

use crate::buffer::{BufferError, BufferOwner, ScratchBuffer};
use crate::host::{CallMode, Host, Renderer};
use crate::serialize::{write_live_leds, write_state, SerializeOptions};
use crate::state::DeviceState;
use crate::value::Record;

/// Default wait for the scratch buffer.
pub const DEFAULT_BUFFER_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Display, Error, From)]
pub enum ApiError {
    #[display("{_0}")]
    #[from]
    Buffer(BufferError),
    #[display("malformed request: {_0}")]
    #[from]
    Json(serde_json::Error),
    #[display("request is not a JSON object")]
    NotAnObject,
}

pub struct JsonApi {
    buffer: ScratchBuffer,
    timeout: Duration,
}

impl Default for JsonApi {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_TIMEOUT)
    }
}

fn parse_record(body: &[u8]) -> Result<Record, ApiError> {
    match serde_json::from_slice::<serde_json::Value>(body)? {
        serde_json::Value::Object(map) => Ok(Record::from(map)),
        _ => Err(ApiError::NotAnObject),
    }
}

impl JsonApi {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            buffer: ScratchBuffer::new(),
            timeout,
        }
    }

    #[must_use]
    pub const fn buffer(&self) -> &ScratchBuffer {
        &self.buffer
    }

    /// Merge a state request. Returns the full state when the request set `"v"`.
    pub fn handle_state_request(
        &self,
        state: &mut DeviceState,
        body: &[u8],
        call_mode: CallMode,
        host: &mut Host<'_>,
    ) -> Result<Option<Vec<u8>>, ApiError> {
        let mut scratch = self.buffer.acquire(BufferOwner::StateRequest, self.timeout)?;
        let request = parse_record(body)?;
        if !state.merge(&request, call_mode, None, host) {
            return Ok(None);
        }
        write_state(state, SerializeOptions::LIVE, host.renderer.now_ms(), &mut *scratch)?;
        Ok(Some(scratch.clone()))
    }

    /// Apply stored preset `id` (a state document) on behalf of the preset service.
    pub fn apply_preset(
        &self,
        state: &mut DeviceState,
        id: u8,
        preset: &serde_json::Value,
        call_mode: CallMode,
        host: &mut Host<'_>,
    ) -> Result<(), ApiError> {
        let _scratch = self.buffer.acquire(BufferOwner::Preset, self.timeout)?;
        let serde_json::Value::Object(map) = preset else {
            return Err(ApiError::NotAnObject);
        };
        debug!("Loading preset {id}");
        let record = Record::from(map.clone());
        state.merge(&record, call_mode, Some(id), host);
        Ok(())
    }

    /// Serialize the full state.
    pub fn serve_state(&self, state: &DeviceState, now_ms: u32) -> Result<Vec<u8>, ApiError> {
        let mut scratch = self.buffer.acquire(BufferOwner::StateRead, self.timeout)?;
        write_state(state, SerializeOptions::LIVE, now_ms, &mut *scratch)?;
        Ok(scratch.clone())
    }

    /// Serialize the live LED preview.
    pub fn serve_live_leds(&self, state: &DeviceState, renderer: &dyn Renderer) -> Result<Vec<u8>, ApiError> {
        let mut scratch = self.buffer.acquire(BufferOwner::LiveLeds, self.timeout)?;
        write_live_leds(state.strip.total_leds(), renderer, &mut *scratch)?;
        Ok(scratch.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StripConfig;
    use crate::host::testing::{Call, Harness};
    use serde_json::{json, Value as Json};
    use std::thread;

    fn state() -> DeviceState {
        DeviceState::new(StripConfig {
            total_leds: 10,
            max_segments: 4,
            ..StripConfig::default()
        })
    }

    #[test]
    fn test_request_without_echo() {
        let api = JsonApi::default();
        let mut state = state();
        let mut harness = Harness::new(10);
        let reply = api
            .handle_state_request(&mut state, br#"{"bri": 42}"#, CallMode::DirectChange, &mut harness.host())
            .unwrap();
        assert!(reply.is_none());
        assert_eq!(state.bri, 42);
        assert_eq!(api.buffer().holder(), None);
    }

    #[test]
    fn test_request_with_echo() {
        let api = JsonApi::default();
        let mut state = state();
        let mut harness = Harness::new(10);
        let reply = api
            .handle_state_request(&mut state, br#"{"on": false, "v": true}"#, CallMode::DirectChange, &mut harness.host())
            .unwrap()
            .unwrap();
        let doc: Json = serde_json::from_slice(&reply).unwrap();
        assert_eq!(doc["on"], false);
        assert_eq!(doc["bri"], 128);
    }

    #[test]
    fn test_preset_load_releases_buffer() {
        let api = JsonApi::default();
        let mut state = state();
        let mut harness = Harness::new(10);
        let reply = api
            .handle_state_request(&mut state, br#"{"ps": 2, "v": true}"#, CallMode::DirectChange, &mut harness.host())
            .unwrap();
        assert!(reply.is_some());
        assert!(harness.services.has(&Call::ApplyPreset(2)));
        assert_eq!(api.buffer().holder(), None);
    }

    #[test]
    fn test_malformed_requests() {
        let api = JsonApi::default();
        let mut state = state();
        let mut harness = Harness::new(10);
        let err = api
            .handle_state_request(&mut state, b"{bri", CallMode::DirectChange, &mut harness.host())
            .unwrap_err();
        assert!(matches!(err, ApiError::Json(_)));

        let err = api
            .handle_state_request(&mut state, b"[1]", CallMode::DirectChange, &mut harness.host())
            .unwrap_err();
        assert!(matches!(err, ApiError::NotAnObject));
        assert_eq!(err.to_string(), "request is not a JSON object");
        assert_eq!(api.buffer().holder(), None);
    }

    #[test]
    fn test_apply_preset_marks_current() {
        let api = JsonApi::default();
        let mut state = state();
        let mut harness = Harness::new(10);
        let preset = json!({"bri": 9, "seg": [{"fx": 4}]});
        api.apply_preset(&mut state, 7, &preset, CallMode::DirectChange, &mut harness.host())
            .unwrap();
        assert_eq!(state.bri, 9);
        assert_eq!(state.strip.segment(0).unwrap().mode, 4);
        assert_eq!(state.current_preset, Some(7));
    }

    #[test]
    fn test_busy_buffer_rejects_read() {
        let api = JsonApi::new(Duration::from_millis(20));
        let state = state();
        let _held = api
            .buffer()
            .acquire(BufferOwner::StateRequest, Duration::ZERO)
            .unwrap();

        thread::scope(|s| {
            let result = s.spawn(|| api.serve_state(&state, 0).map(|_| ())).join().unwrap();
            match result {
                Err(ApiError::Buffer(BufferError::Busy { holder, .. })) => {
                    assert_eq!(holder, Some(BufferOwner::StateRequest));
                }
                other => panic!("expected busy error, got {other:?}"),
            }
        });
    }

    #[test]
    fn test_live_leds() {
        let api = JsonApi::default();
        let state = state();
        let harness = Harness::new(10);
        let bytes = api.serve_live_leds(&state, &harness.renderer).unwrap();
        let doc: Json = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["n"], 1);
        assert_eq!(doc["leds"].as_array().unwrap().len(), 10);
    }
}
