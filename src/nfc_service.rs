// src/nfc_service.rs
use crossbeam_channel::{Receiver, Sender};
use log::{error, info, warn};
use pcsc::{Card, Context, PNP_NOTIFICATION, Protocols, ReaderState, Scope, ShareMode, State};
use std::ffi::{CStr, CString};
use std::time::Duration;

use nfc_type2::apdu::PcscChannel;
use nfc_type2::{ReaderConfig, TagWriter, read_tag};

use crate::types::{NdefPayload, NfcCommand, OutgoingMessage, TagReport, build_message};

pub fn run(tx: Sender<OutgoingMessage>, rx: Receiver<NfcCommand>, config: ReaderConfig) {
    info!("Starting NFC Service (Event Driven)...");

    let ctx = match Context::establish(Scope::User) {
        Ok(ctx) => ctx,
        Err(err) => {
            error!("Failed to establish context: {}", err);
            let _ = tx.send(OutgoingMessage::READER_ERROR {
                error: err.to_string(),
            });
            return;
        }
    };

    let mut readers_buf = [0; 2048];
    let mut reader_names: Vec<CString> = Vec::new();
    let mut reader_states = vec![ReaderState::new(PNP_NOTIFICATION(), State::UNAWARE)];

    loop {
        // 1. Wait for State Change
        if let Err(err) = ctx.get_status_change(Duration::from_millis(500), &mut reader_states) {
            if err != pcsc::Error::Timeout {
                error!("PCSC Error: {}", err);
                std::thread::sleep(Duration::from_secs(1));
                continue;
            }
        }

        // 2. CHECK FOR COMMANDS
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                NfcCommand::Write { payloads } => {
                    info!("Received Write Command with {} records", payloads.len());
                    handle_write_command(&ctx, &reader_names, &payloads, &tx);
                }
                NfcCommand::Erase => {
                    info!("Received Erase Command");
                    handle_erase_command(&ctx, &reader_names, &tx);
                }
                NfcCommand::CheckReaderStatus => {
                    let _ = tx.send(OutgoingMessage::READER_STATUS {
                        success: !reader_names.is_empty(),
                    });
                }
            }
        }

        // 3. PROCESS EVENTS
        let mut readers_changed = false;

        // Check PnP (Index 0)
        if reader_states[0].event_state().intersects(State::CHANGED) {
            info!("Hardware change detected");
            readers_changed = true;
            reader_states[0].sync_current_state();
        }

        // Check Readers (Indices 1..)
        for i in 1..reader_states.len() {
            let Some(name) = reader_names.get(i - 1).cloned() else {
                continue;
            };
            let rs = &reader_states[i];

            if rs.event_state().intersects(State::CHANGED) {
                let current = rs.event_state();

                // Card Inserted
                if current.intersects(State::PRESENT)
                    && !rs.current_state().intersects(State::PRESENT)
                {
                    info!("Card Inserted on {:?}", name);
                    handle_card_insertion(&ctx, &name, &config, &tx);
                }

                // Card Removed
                if current.intersects(State::EMPTY) && rs.current_state().intersects(State::PRESENT)
                {
                    info!("Card Removed from {:?}", name);
                    let _ = tx.send(OutgoingMessage::CARD_STATUS {
                        success: false,
                        message: "Card removed!".into(),
                    });
                }

                reader_states[i].sync_current_state();
            }
        }

        // 4. REFRESH LIST
        if readers_changed {
            match ctx.list_readers(&mut readers_buf) {
                Ok(iter) => {
                    reader_names = iter.map(CString::from).collect();
                    // Keep the PnP state (index 0), rebuild the rest
                    reader_states.truncate(1);
                    for name in &reader_names {
                        reader_states.push(ReaderState::new(name.clone(), State::UNAWARE));
                    }

                    let _ = tx.send(OutgoingMessage::READER_STATUS {
                        success: !reader_names.is_empty(),
                    });
                }
                Err(_) => {
                    reader_names.clear();
                    reader_states.truncate(1);
                    let _ = tx.send(OutgoingMessage::READER_STATUS { success: false });
                }
            }
        }
    }
}

fn handle_card_insertion(
    ctx: &Context,
    reader_name: &CStr,
    config: &ReaderConfig,
    tx: &Sender<OutgoingMessage>,
) {
    let _ = tx.send(OutgoingMessage::CARD_STATUS {
        success: true,
        message: "Card detected!".into(),
    });

    match ctx.connect(reader_name, ShareMode::Shared, Protocols::ANY) {
        Ok(card) => {
            let mut channel = PcscChannel::new(&card);
            let uid = match channel.uid() {
                Ok(uid) => uid,
                Err(e) => {
                    warn!("Could not read UID: {}", e);
                    Vec::new()
                }
            };

            let decoded = read_tag(&mut channel, uid, config);
            if decoded.message.is_none() {
                info!("Tag {} carries no NDEF message", hex::encode_upper(&decoded.uid));
            }
            let _ = tx.send(OutgoingMessage::TAG_READ(TagReport::from(&decoded)));
        }
        Err(e) => {
            error!("Failed to connect to card: {}", e);
            let _ = tx.send(OutgoingMessage::DATA_READ_ERROR {
                error: e.to_string(),
            });
        }
    }
}

/// Connect to the first reader that has a card on it.
fn first_card(ctx: &Context, reader_names: &[CString]) -> Option<Card> {
    reader_names
        .iter()
        .find_map(|name| ctx.connect(name, ShareMode::Shared, Protocols::ANY).ok())
}

fn handle_write_command(
    ctx: &Context,
    reader_names: &[CString],
    payloads: &[NdefPayload],
    tx: &Sender<OutgoingMessage>,
) {
    if reader_names.is_empty() {
        let _ = tx.send(OutgoingMessage::DATA_WRITE_ERROR {
            error: "No reader connected".into(),
        });
        return;
    }

    let Some(card) = first_card(ctx, reader_names) else {
        let _ = tx.send(OutgoingMessage::DATA_WRITE_ERROR {
            error: "No card found on reader".into(),
        });
        return;
    };

    let message = build_message(payloads);
    let mut writer = TagWriter::new(PcscChannel::new(&card));
    match writer.write_message(&message) {
        Ok(pages) => {
            let _ = tx.send(OutgoingMessage::DATA_WRITE_SUCCESS {
                message: format!("Data Written Successfully! ({} pages)", pages),
            });
        }
        Err(e) => {
            let _ = tx.send(OutgoingMessage::DATA_WRITE_ERROR {
                error: e.to_string(),
            });
        }
    }
}

fn handle_erase_command(ctx: &Context, reader_names: &[CString], tx: &Sender<OutgoingMessage>) {
    let Some(card) = first_card(ctx, reader_names) else {
        let _ = tx.send(OutgoingMessage::DATA_WRITE_ERROR {
            error: "No card found on reader".into(),
        });
        return;
    };

    match TagWriter::new(PcscChannel::new(&card)).erase() {
        Ok(pages) => {
            let _ = tx.send(OutgoingMessage::DATA_WRITE_SUCCESS {
                message: format!("Tag erased ({} pages)", pages),
            });
        }
        Err(e) => {
            let _ = tx.send(OutgoingMessage::DATA_WRITE_ERROR {
                error: e.to_string(),
            });
        }
    }
}
