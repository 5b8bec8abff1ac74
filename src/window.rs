// src/window.rs
use crate::config::{DATA_START_PAGE, MAX_PAGE, PAGE_SIZE};
use std::ops::Deref;

/// Every byte read so far, indexed from the first data page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryWindow {
    start_page: u8,
    bytes: Vec<u8>,
}

impl MemoryWindow {
    pub fn new() -> Self {
        Self::at(DATA_START_PAGE)
    }

    pub fn at(start_page: u8) -> Self {
        MemoryWindow {
            start_page,
            bytes: Vec::new(),
        }
    }

    pub fn from_bytes(start_page: u8, bytes: Vec<u8>) -> Self {
        MemoryWindow { start_page, bytes }
    }

    pub fn start_page(&self) -> u8 {
        self.start_page
    }

    /// First page not fully covered by the window. A trailing partial page is
    /// re-read rather than skipped.
    pub fn next_page(&self) -> Option<u8> {
        let page = self.start_page as usize + self.bytes.len() / PAGE_SIZE;
        if page > MAX_PAGE as usize {
            None
        } else {
            Some(page as u8)
        }
    }

    /// Place bytes read from `page` into the window, dropping whatever the
    /// window held from that page onward. Returns how many new bytes the
    /// window grew by.
    pub fn splice(&mut self, page: u8, data: &[u8]) -> usize {
        let before = self.bytes.len();
        let at = (page.saturating_sub(self.start_page) as usize) * PAGE_SIZE;
        self.bytes.truncate(at.min(before));
        self.bytes.extend_from_slice(data);
        self.bytes.len().saturating_sub(before)
    }

    /// Bytes in front of the first data page (capability page etc.) when
    /// the window was started early.
    pub fn data_offset(&self) -> usize {
        DATA_START_PAGE.saturating_sub(self.start_page) as usize * PAGE_SIZE
    }

    /// The window from the first data page on; TLV and record offsets index
    /// into this.
    pub fn data(&self) -> &[u8] {
        self.bytes.get(self.data_offset()..).unwrap_or(&[])
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Default for MemoryWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for MemoryWindow {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}
