// src/apdu.rs
use pcsc::Card;

use crate::channel::{PageChannel, read_in_blocks};
use crate::config::{PAGE_SIZE, READ_GRANULARITY};
use crate::error::ChannelError;

fn transmit(card: &Card, apdu: &[u8]) -> Result<Vec<u8>, ChannelError> {
    let mut recv_buffer = [0u8; 256];
    match card.transmit(apdu, &mut recv_buffer) {
        Ok(resp) => {
            let n = resp.len();
            // 0x90 0x00 is Success
            if n >= 2 && resp[n - 2] == 0x90 && resp[n - 1] == 0x00 {
                // Return data without status word
                Ok(resp[..n - 2].to_vec())
            } else {
                Err(ChannelError::Nak {
                    status: if n >= 2 { resp[n - 2] } else { 0xFF },
                })
            }
        }
        Err(e) => Err(ChannelError::Transmit(e.to_string())),
    }
}

// Get Data: FF CA 00 00 00
pub fn get_uid(card: &Card) -> Result<Vec<u8>, ChannelError> {
    transmit(card, &[0xFF, 0xCA, 0x00, 0x00, 0x00])
}

pub fn read_binary(card: &Card, page: u8, length: u8) -> Result<Vec<u8>, ChannelError> {
    // Read: FF B0 00 Page Len
    transmit(card, &[0xFF, 0xB0, 0x00, page, length])
}

pub fn update_binary(card: &Card, page: u8, data: &[u8]) -> Result<(), ChannelError> {
    // Write: FF D6 00 Page Len [Data]
    let mut apdu = vec![0xFF, 0xD6, 0x00, page, data.len() as u8];
    apdu.extend_from_slice(data);
    transmit(card, &apdu).map(|_| ())
}

/// Type 2 page access through a PC/SC reader's storage card pseudo-APDUs
/// (ACR122U and compatibles).
pub struct PcscChannel<'a> {
    card: &'a Card,
}

impl<'a> PcscChannel<'a> {
    pub fn new(card: &'a Card) -> Self {
        PcscChannel { card }
    }

    pub fn uid(&self) -> Result<Vec<u8>, ChannelError> {
        get_uid(self.card)
    }
}

impl PageChannel for PcscChannel<'_> {
    fn read_pages(&mut self, start_page: u8, byte_count: u16) -> Result<Vec<u8>, ChannelError> {
        read_in_blocks(start_page, byte_count, |page| {
            let data = read_binary(self.card, page, READ_GRANULARITY as u8)?;
            if data.len() < READ_GRANULARITY {
                return Err(ChannelError::Transmit(format!(
                    "Short read at page {}: {} bytes",
                    page,
                    data.len()
                )));
            }
            // SW 90 00 stands in for the 0x00 exchange status
            let mut response = Vec::with_capacity(1 + data.len());
            response.push(0x00);
            response.extend_from_slice(&data);
            Ok(response)
        })
    }

    fn write_page(&mut self, page: u8, data: [u8; PAGE_SIZE]) -> Result<(), ChannelError> {
        update_binary(self.card, page, &data)
    }
}
