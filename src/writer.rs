// src/writer.rs
use log::{error, info};

use crate::channel::PageChannel;
use crate::config::{DATA_START_PAGE, MAX_PAGE, PAGE_SIZE, TLV_LENGTH_ESCAPE, TLV_NDEF, TLV_TERMINATOR};
use crate::error::WriteError;
use crate::ndef::NdefMessage;

/// Page-aligned size of `message_length` bytes once wrapped:
/// TLV header (2 or 4 bytes) + message + terminator.
pub fn required_capacity(message_length: usize) -> usize {
    let header = if message_length < 255 { 2 } else { 4 };
    (header + message_length + 1).div_ceil(PAGE_SIZE) * PAGE_SIZE
}

/// `[0x03][L or FF HH LL][message][0xFE][zero padding]`
pub fn wrap_in_tlv(ndef_bytes: &[u8]) -> Result<Vec<u8>, WriteError> {
    let length = u16::try_from(ndef_bytes.len()).map_err(|_| WriteError::MessageTooLong {
        length: ndef_bytes.len(),
    })?;
    let buffer_length = required_capacity(ndef_bytes.len());
    let mut tlv = Vec::with_capacity(buffer_length);
    // T = 0x03 (NDEF Message)
    tlv.push(TLV_NDEF);

    if ndef_bytes.len() < 255 {
        tlv.push(ndef_bytes.len() as u8);
    } else {
        tlv.push(TLV_LENGTH_ESCAPE);
        tlv.extend_from_slice(&length.to_be_bytes());
    }

    tlv.extend_from_slice(ndef_bytes);
    tlv.push(TLV_TERMINATOR);
    tlv.resize(buffer_length, 0x00);
    Ok(tlv)
}

pub struct TagWriter<C> {
    channel: C,
}

impl<C: PageChannel> TagWriter<C> {
    pub fn new(channel: C) -> Self {
        TagWriter { channel }
    }

    pub fn into_inner(self) -> C {
        self.channel
    }

    pub fn write_message(&mut self, message: &NdefMessage) -> Result<usize, WriteError> {
        self.write_bytes(&message.encode()?)
    }

    /// Wrap an encoded NDEF message and write it from page 4 on.
    ///
    /// Capacity is checked before anything is written. A failed page write
    /// stops immediately and leaves earlier pages as written. Returns the
    /// number of pages written.
    pub fn write_bytes(&mut self, encoded: &[u8]) -> Result<usize, WriteError> {
        let capacity = self.channel.capacity() as usize;
        let buffer_length = required_capacity(encoded.len());

        if buffer_length > capacity {
            error!(
                "Message length exceeds tag capacity {} > {}",
                buffer_length, capacity
            );
            return Err(WriteError::Capacity {
                required: buffer_length,
                capacity,
            });
        }

        let buffer = wrap_in_tlv(encoded)?;
        let pages = self.write_pages(&buffer)?;
        info!("Wrote {} bytes of NDEF in {} pages", encoded.len(), pages);
        Ok(pages)
    }

    /// Zero the whole data area.
    pub fn erase(&mut self) -> Result<usize, WriteError> {
        let capacity = self.channel.capacity() as usize;
        let blank = vec![0u8; capacity / PAGE_SIZE * PAGE_SIZE];
        self.write_pages(&blank)
    }

    fn write_pages(&mut self, buffer: &[u8]) -> Result<usize, WriteError> {
        let pages = buffer.len() / PAGE_SIZE;
        if DATA_START_PAGE as usize + pages > MAX_PAGE as usize + 1 {
            return Err(WriteError::PageOverflow { pages });
        }

        for (i, chunk) in buffer.chunks_exact(PAGE_SIZE).enumerate() {
            let page = DATA_START_PAGE + i as u8;
            let mut data = [0u8; PAGE_SIZE];
            data.copy_from_slice(chunk);
            if let Err(source) = self.channel.write_page(page, data) {
                error!("Error writing page {}: {}", page, source);
                return Err(WriteError::Page { page, source });
            }
        }
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::MemoryTag;

    #[test]
    fn capacity_formula() {
        assert_eq!(required_capacity(0), 4);
        assert_eq!(required_capacity(1), 4);
        assert_eq!(required_capacity(2), 8);
        assert_eq!(required_capacity(60), 64);
        assert_eq!(required_capacity(254), 260);
        assert_eq!(required_capacity(255), 260);
        assert_eq!(required_capacity(256), 264);
    }

    #[test]
    fn short_and_long_wrapping() {
        assert_eq!(wrap_in_tlv(&[0xAA, 0xBB]).unwrap(), vec![0x03, 0x02, 0xAA, 0xBB, 0xFE, 0, 0, 0]);
        let long = vec![0x11; 300];
        let wrapped = wrap_in_tlv(&long).unwrap();
        assert_eq!(&wrapped[..4], &[0x03, 0xFF, 0x01, 0x2C]);
        assert_eq!(wrapped[304], 0xFE);
        assert_eq!(wrapped.len() % 4, 0);
    }

    #[test]
    fn length_field_limit() {
        assert_eq!(
            wrap_in_tlv(&vec![0; 65_536]),
            Err(WriteError::MessageTooLong { length: 65_536 })
        );
        assert!(wrap_in_tlv(&vec![0; 65_535]).is_ok());
    }

    #[test]
    fn unencodable_message_writes_nothing() {
        let mut tag = MemoryTag::new(64);
        let message = NdefMessage::new(vec![crate::ndef::NdefRecord::external(&[b't'; 300], vec![1])]);
        let err = TagWriter::new(&mut tag).write_message(&message).unwrap_err();
        assert!(matches!(err, WriteError::Encode(_)));
        assert!(tag.writes().is_empty());
    }

    #[test]
    fn rejects_oversized_message_without_writing() {
        // 60 bytes wraps to 64; capacity byte 6 gives 48
        let mut tag = MemoryTag::new(64).with_capacity_byte(6);
        let mut writer = TagWriter::new(&mut tag);
        let err = writer.write_bytes(&[0x42; 60]).unwrap_err();
        assert_eq!(
            err,
            WriteError::Capacity {
                required: 64,
                capacity: 48
            }
        );
        assert!(tag.writes().is_empty());
    }

    #[test]
    fn writes_pages_in_order_from_page_four() {
        let mut tag = MemoryTag::new(64);
        let pages = TagWriter::new(&mut tag).write_bytes(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(pages, 3);
        assert_eq!(tag.writes(), &[4, 5, 6]);
        assert_eq!(&tag.data()[..12], &[0x03, 6, 1, 2, 3, 4, 5, 6, 0xFE, 0, 0, 0]);
    }

    #[test]
    fn stops_at_first_failed_page() {
        let mut tag = MemoryTag::new(64).fail_write_at(6);
        let err = TagWriter::new(&mut tag).write_bytes(&[0x77; 20]).unwrap_err();
        assert!(matches!(err, WriteError::Page { page: 6, .. }));
        assert_eq!(tag.writes(), &[4, 5, 6]);
        assert_eq!(tag.data()[..2], [0x03, 20]);
        assert_eq!(tag.data()[8], 0x00);
    }

    #[test]
    fn erase_blanks_data_area() {
        let mut tag = MemoryTag::with_data(&[0x5A; 64]);
        let capacity = tag.capacity() as usize;
        let pages = TagWriter::new(&mut tag).erase().unwrap();
        assert_eq!(pages, capacity / 4);
        assert!(tag.data().iter().all(|&b| b == 0));
    }
}
