// src/config.rs
use serde::Deserialize;
use std::path::Path;

// Type 2 memory geometry
pub const PAGE_SIZE: usize = 4;
pub const PAGES_PER_READ: usize = 4;
pub const READ_GRANULARITY: usize = PAGE_SIZE * PAGES_PER_READ; // 16 bytes per READ exchange
pub const CAPABILITY_PAGE: u8 = 3;
pub const DATA_START_PAGE: u8 = 4;
pub const MAX_PAGE: u8 = 255;

// TLV tags
pub const TLV_NDEF: u8 = 0x03;
pub const TLV_TERMINATOR: u8 = 0xFE;
pub const TLV_LENGTH_ESCAPE: u8 = 0xFF;

/// Tunable read-path heuristics.
///
/// The defaults were tuned on Ultralight/NTAG21x tags whose TLV length is
/// frequently understated or split across envelopes; other tag families may
/// need different bounds. Any field missing from a JSON override keeps its
/// default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Minimum number of bytes fetched after the first window, regardless of
    /// the declared length.
    pub read_floor: usize,
    /// Chunk sizes tried, in order, once the bulk read fails.
    pub fallback_chunks: Vec<usize>,
    /// A fallback run gaining at least min(target, this) bytes counts as a
    /// usable partial read.
    pub partial_threshold: usize,
    /// `03 FF 03 LL`: LL in (0, this] makes the inner TLV authoritative.
    pub second_tlv_max_length: u16,
    /// Upper bound for a 3-byte TLV length on this memory class.
    pub max_extended_length: u16,
    pub record_tnf_max: u8,
    pub record_type_max: u8,
    /// Exclusive upper bound for a scanned short-record payload length.
    pub record_payload_max: u8,
    /// Largest length byte accepted for a TLV fragment.
    pub fragment_length_max: u8,
    /// Extra bytes requested on top of what an incomplete record is missing.
    pub record_safety_margin: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            read_floor: 256,
            fallback_chunks: vec![64, 32, 16],
            partial_threshold: 100,
            second_tlv_max_length: 100,
            max_extended_length: 924,
            record_tnf_max: 6,
            record_type_max: 8,
            record_payload_max: 200,
            fragment_length_max: 254,
            record_safety_margin: 8,
        }
    }
}

impl ReaderConfig {
    pub fn from_json(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| format!("Invalid reader config: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_json(&text)
    }

    /// Chunk tiers smaller than `limit`, smallest granularity always last.
    pub(crate) fn chunks_below(&self, limit: usize) -> Vec<usize> {
        let mut tiers: Vec<usize> = self
            .fallback_chunks
            .iter()
            .copied()
            .filter(|&c| c > 0 && c < limit)
            .collect();
        if tiers.is_empty() {
            tiers.push(READ_GRANULARITY.min(limit.max(1)));
        }
        tiers
    }
}
