// src/sim.rs
//! In-memory Type 2 tag for tests and dry runs.

use crate::channel::{PageChannel, read_in_blocks};
use crate::config::{CAPABILITY_PAGE, DATA_START_PAGE, PAGE_SIZE, PAGES_PER_READ, READ_GRANULARITY};
use crate::error::ChannelError;

const ALL_PAGES: usize = 256;

/// Deterministic tag memory behind a `PageChannel`.
///
/// Reads go out in 16-byte blocks like the real READ command, always return
/// whole blocks, and fail with a NAK as soon as a block touches a page at or
/// past `readable_pages`. Every `read_pages` request and every attempted
/// page write is logged.
#[derive(Debug, Clone)]
pub struct MemoryTag {
    memory: Vec<u8>,
    readable_pages: usize,
    fail_write_at: Option<u8>,
    reads: Vec<(u8, u16)>,
    writes: Vec<u8>,
}

impl MemoryTag {
    /// Blank, formatted tag with `pages` pages (UID/lock pages included).
    pub fn new(pages: usize) -> Self {
        let pages = pages.clamp(DATA_START_PAGE as usize + 1, ALL_PAGES);
        let mut memory = vec![0u8; pages * PAGE_SIZE];
        let data_bytes = (pages - DATA_START_PAGE as usize) * PAGE_SIZE;
        let cc = CAPABILITY_PAGE as usize * PAGE_SIZE;
        memory[cc..cc + PAGE_SIZE].copy_from_slice(&[0xE1, 0x10, (data_bytes / 8) as u8, 0x00]);
        MemoryTag {
            memory,
            readable_pages: pages,
            fail_write_at: None,
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Largest tag this memory class addresses, with `data` placed at page 4.
    pub fn with_data(data: &[u8]) -> Self {
        let mut tag = Self::new(ALL_PAGES);
        let start = DATA_START_PAGE as usize * PAGE_SIZE;
        let end = (start + data.len()).min(tag.memory.len());
        tag.memory[start..end].copy_from_slice(&data[..end - start]);
        tag
    }

    pub fn with_capacity_byte(mut self, value: u8) -> Self {
        self.memory[CAPABILITY_PAGE as usize * PAGE_SIZE + 2] = value;
        self
    }

    /// Reads touching page `pages` or later fail.
    pub fn readable_pages(mut self, pages: usize) -> Self {
        self.readable_pages = pages;
        self
    }

    pub fn fail_write_at(mut self, page: u8) -> Self {
        self.fail_write_at = Some(page);
        self
    }

    pub fn reads(&self) -> &[(u8, u16)] {
        &self.reads
    }

    pub fn writes(&self) -> &[u8] {
        &self.writes
    }

    pub fn clear_log(&mut self) {
        self.reads.clear();
        self.writes.clear();
    }

    /// Memory from the first data page on.
    pub fn data(&self) -> &[u8] {
        &self.memory[DATA_START_PAGE as usize * PAGE_SIZE..]
    }

    fn page_count(&self) -> usize {
        self.memory.len() / PAGE_SIZE
    }
}

impl PageChannel for MemoryTag {
    fn read_pages(&mut self, start_page: u8, byte_count: u16) -> Result<Vec<u8>, ChannelError> {
        self.reads.push((start_page, byte_count));
        let limit = self.readable_pages.min(self.page_count());
        let memory = &self.memory;
        let whole = (byte_count as usize).div_ceil(READ_GRANULARITY) * READ_GRANULARITY;

        read_in_blocks(start_page, whole.min(u16::MAX as usize) as u16, |page| {
            let first = page as usize;
            if first + PAGES_PER_READ > limit {
                return Ok(vec![0x01]);
            }
            let mut response = vec![0x00];
            response.extend_from_slice(&memory[first * PAGE_SIZE..(first + PAGES_PER_READ) * PAGE_SIZE]);
            Ok(response)
        })
    }

    fn write_page(&mut self, page: u8, data: [u8; PAGE_SIZE]) -> Result<(), ChannelError> {
        self.writes.push(page);
        if self.fail_write_at == Some(page) {
            return Err(ChannelError::Transmit("Write not acknowledged".into()));
        }
        let at = page as usize * PAGE_SIZE;
        if at + PAGE_SIZE > self.memory.len() {
            return Err(ChannelError::OutOfRange { page: page as u16 });
        }
        self.memory[at..at + PAGE_SIZE].copy_from_slice(&data);
        Ok(())
    }
}
