//! Mock LED controller speaking the JSON state protocol over TCP
//!
//! Usage: cargo run -p ledsync-mock-server -- [OPTIONS]
//!
//! Each line sent by a client is one request:
//! - a JSON object is merged into the device state
//! - `state` returns the full state document
//! - `live` returns the LED preview

mod config;
mod sim;

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use ledsync_state_lib::{ApiError, CallMode, DeviceState, Host, JsonApi, Renderer};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{LogLevel, ServerConfig};
use crate::sim::{MemoryServices, SimRenderer};

/// Preset loads may chain into further preset loads; stop after this many.
const MAX_CHAINED_PRESETS: usize = 8;

#[derive(Parser, Debug)]
#[command(name = "ledsync-mock")]
#[command(about = "Simulated LED controller for exercising the JSON state API")]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// TCP port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of simulated LEDs (overrides the config file)
    #[arg(short = 'n', long)]
    leds: Option<u16>,

    /// Log level (overrides the config file)
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,
}

struct Device {
    state: DeviceState,
    renderer: SimRenderer,
    services: MemoryServices,
    rng: StdRng,
}

struct Controller {
    api: JsonApi,
    device: Mutex<Device>,
}

impl Controller {
    fn lock(&self) -> MutexGuard<'_, Device> {
        self.device
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn handle_line(&self, line: &str) -> Result<Vec<u8>, ApiError> {
        let mut device = self.lock();
        let Device {
            state,
            renderer,
            services,
            rng,
        } = &mut *device;
        state.tick(renderer);

        let reply = match line {
            "state" => self.api.serve_state(state, renderer.now_ms()),
            "live" => self.api.serve_live_leds(state, renderer),
            body => {
                let reply = {
                    let mut host = Host::new(renderer, services, rng);
                    self.api
                        .handle_state_request(state, body.as_bytes(), CallMode::DirectChange, &mut host)?
                };

                for _ in 0..MAX_CHAINED_PRESETS {
                    let Some((id, mode, preset)) = services.take_pending() else {
                        break;
                    };
                    let mut host = Host::new(renderer, services, rng);
                    self.api.apply_preset(state, id, &preset, mode, &mut host)?;
                }

                Ok(reply.unwrap_or_else(|| br#"{"success":true}"#.to_vec()))
            }
        };

        if let Some(mode) = state.take_interface_update() {
            debug!("Interface refresh requested ({mode:?})");
        }
        reply
    }
}

fn error_reply(err: &ApiError) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({ "error": err.to_string() }))
        .unwrap_or_else(|_| br#"{"error":"internal"}"#.to_vec())
}

fn handle_client(controller: &Controller, stream: TcpStream) -> Result<()> {
    let mut writer = stream.try_clone().context("cloning client stream")?;
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let line = line.context("reading request")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!("RX: {line}");

        let mut reply = controller.handle_line(line).unwrap_or_else(|e| {
            warn!("Request failed: {e}");
            error_reply(&e)
        });
        reply.push(b'\n');
        writer.write_all(&reply).context("writing reply")?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::load_or_default(args.config.as_deref());
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(leds) = args.leds {
        config.strip.total_leds = leds;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    config.validate();

    env_logger::Builder::new()
        .filter_level(config.log_level.as_level_filter())
        .init();

    let controller = Arc::new(Controller {
        api: JsonApi::new(config.buffer_timeout()),
        device: Mutex::new(Device {
            state: DeviceState::new(config.strip.clone()),
            renderer: SimRenderer::new(config.strip.total_leds),
            services: MemoryServices::default(),
            rng: StdRng::from_entropy(),
        }),
    });

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address).with_context(|| format!("binding {address}"))?;
    info!(
        "Mock controller with {} LEDs listening on {address}",
        config.strip.total_leds
    );

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_default();
                info!("Client connected: {peer}");
                let controller = Arc::clone(&controller);
                thread::spawn(move || {
                    if let Err(e) = handle_client(&controller, stream) {
                        error!("Client {peer}: {e:#}");
                    }
                    info!("Client disconnected: {peer}");
                });
            }
            Err(e) => error!("Connection error: {e}"),
        }
    }
    Ok(())
}
