// src/channel.rs
use crate::config::{CAPABILITY_PAGE, MAX_PAGE, PAGE_SIZE, PAGES_PER_READ, READ_GRANULARITY};
use crate::error::ChannelError;

/// Synchronous page access to a presented Type 2 tag.
///
/// Every call is one blocking request/response exchange (or a short run of
/// them). Pages are absolute, so the channel keeps no read position between
/// calls.
pub trait PageChannel {
    /// Read `byte_count` bytes starting at `start_page`.
    ///
    /// Implementations may return more than asked for, up to the next multiple
    /// of the 16-byte read granularity. Callers trim the tail.
    fn read_pages(&mut self, start_page: u8, byte_count: u16) -> Result<Vec<u8>, ChannelError>;

    fn write_page(&mut self, page: u8, data: [u8; PAGE_SIZE]) -> Result<(), ChannelError>;

    /// Data area size in bytes from the capability container (page 3, byte 2 * 8).
    /// Zero when the page cannot be read.
    fn capacity(&mut self) -> u16 {
        match self.read_pages(CAPABILITY_PAGE, PAGE_SIZE as u16) {
            Ok(cc) if cc.len() >= 3 => cc[2] as u16 * 8,
            _ => 0,
        }
    }
}

impl<C: PageChannel + ?Sized> PageChannel for &mut C {
    fn read_pages(&mut self, start_page: u8, byte_count: u16) -> Result<Vec<u8>, ChannelError> {
        (**self).read_pages(start_page, byte_count)
    }

    fn write_page(&mut self, page: u8, data: [u8; PAGE_SIZE]) -> Result<(), ChannelError> {
        (**self).write_page(page, data)
    }

    fn capacity(&mut self) -> u16 {
        (**self).capacity()
    }
}

/// Drive a block-oriented READ command (4 pages per exchange) to cover
/// `byte_count` bytes from `start_page`.
///
/// `read_block` returns the raw response of one exchange, leading status byte
/// included; anything but 0x00 there fails the whole read. The head of every
/// block is kept and only the tail past `byte_count` is dropped.
pub fn read_in_blocks<F>(start_page: u8, byte_count: u16, mut read_block: F) -> Result<Vec<u8>, ChannelError>
where
    F: FnMut(u8) -> Result<Vec<u8>, ChannelError>,
{
    let wanted = byte_count as usize;
    let mut data = Vec::with_capacity(wanted);
    let mut i = 0usize;

    while i * READ_GRANULARITY < wanted {
        let page = start_page as usize + i * PAGES_PER_READ;
        if page > MAX_PAGE as usize {
            return Err(ChannelError::OutOfRange { page: page as u16 });
        }

        let response = read_block(page as u8)?;
        match response.first() {
            Some(0x00) => {}
            Some(&status) => return Err(ChannelError::Nak { status }),
            None => return Err(ChannelError::Transmit("Empty response".into())),
        }

        let block = &response[1..];
        let end = ((i + 1) * READ_GRANULARITY).min(wanted) - i * READ_GRANULARITY;
        data.extend_from_slice(&block[..end.min(block.len())]);
        i += 1;
    }

    Ok(data)
}
