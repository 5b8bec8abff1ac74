mod nfc_service;
mod types;
mod ws;

use crossbeam_channel::unbounded;
use log::{info, warn};
use std::net::SocketAddr;
use tokio::sync::broadcast;

use nfc_type2::ReaderConfig;

const CONFIG_ENV: &str = "NFC_TYPE2_CONFIG";
const ADDR_ENV: &str = "NFC_TYPE2_ADDR";
const DEFAULT_ADDR: &str = "127.0.0.1:3500";

fn load_config() -> ReaderConfig {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => match ReaderConfig::load(path.as_ref()) {
            Ok(config) => {
                info!("Loaded reader config from {:?}", path);
                config
            }
            Err(e) => {
                warn!("{}, using defaults", e);
                ReaderConfig::default()
            }
        },
        None => ReaderConfig::default(),
    }
}

fn listen_addr() -> SocketAddr {
    let raw = std::env::var(ADDR_ENV).unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    raw.parse().unwrap_or_else(|_| {
        warn!("Invalid {} {:?}, using {}", ADDR_ENV, raw, DEFAULT_ADDR);
        SocketAddr::from(([127, 0, 0, 1], 3500))
    })
}

#[tokio::main]
async fn main() {
    env_logger::init();
    info!("Starting NFC Type 2 Service...");

    let config = load_config();

    // Channel: WS -> NFC (Commands)
    // Crossbeam (Sync) because the NFC thread is blocking
    let (cmd_tx, cmd_rx) = unbounded::<types::NfcCommand>();

    // Channel: NFC -> WS (Events)
    let (event_tx, event_rx) = broadcast::channel::<types::OutgoingMessage>(100);

    // Bridge NFC thread -> broadcast, NFC logic on its own blocking thread
    std::thread::spawn(move || {
        let (bridge_tx, bridge_rx) = unbounded::<types::OutgoingMessage>();

        std::thread::spawn(move || {
            nfc_service::run(bridge_tx, cmd_rx, config);
        });

        while let Ok(msg) = bridge_rx.recv() {
            let _ = event_tx.send(msg);
        }
    });

    ws::start_server(listen_addr(), cmd_tx, event_rx).await;
}
