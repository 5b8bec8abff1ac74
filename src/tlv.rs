// src/tlv.rs
use crate::config::{ReaderConfig, TLV_LENGTH_ESCAPE, TLV_NDEF};
use crate::error::FormatError;

// Offset of the NDEF TLV when a fixed 5-byte lock control TLV sits in front of it.
const LOCKED_NDEF_OFFSET: usize = 5;

/// How the 0xFF length marker was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// `03 FF 03 LL`: the inner TLV wins.
    SecondTlv(u8),
    /// 0xFF taken as the literal length 255.
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthEncoding {
    Short(u8),
    Extended(u16),
    Ambiguous(Resolution),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvHeader {
    pub tag: u8,
    pub encoding: LengthEncoding,
    /// Relative to the first data page.
    pub payload_start: usize,
}

impl TlvHeader {
    pub fn length(&self) -> usize {
        match self.encoding {
            LengthEncoding::Short(len) => len as usize,
            LengthEncoding::Extended(len) => len as usize,
            LengthEncoding::Ambiguous(Resolution::SecondTlv(len)) => len as usize,
            LengthEncoding::Ambiguous(Resolution::Literal) => TLV_LENGTH_ESCAPE as usize,
        }
    }

    pub fn end(&self) -> usize {
        self.payload_start + self.length()
    }
}

/// Find the NDEF TLV in the first window of the data region (page 4 onward).
pub fn locate(data: &[u8], config: &ReaderConfig) -> Result<TlvHeader, FormatError> {
    if data.len() < 4 {
        return Err(FormatError::TooShort { len: data.len() });
    }
    if data[..4].iter().all(|&b| b == 0xFF) {
        return Err(FormatError::Unformatted);
    }

    if data[0] == TLV_NDEF {
        let encoding = if data[1] != TLV_LENGTH_ESCAPE {
            LengthEncoding::Short(data[1])
        } else {
            resolve_escape(data[2], data[3], config)
        };
        let payload_start = match encoding {
            LengthEncoding::Short(_) | LengthEncoding::Ambiguous(Resolution::Literal) => 2,
            _ => 4,
        };
        return Ok(TlvHeader {
            tag: TLV_NDEF,
            encoding,
            payload_start,
        });
    }

    if data.len() > LOCKED_NDEF_OFFSET && data[LOCKED_NDEF_OFFSET] == TLV_NDEF {
        if data.len() < LOCKED_NDEF_OFFSET + 2 {
            return Err(FormatError::TooShort { len: data.len() });
        }
        return Ok(TlvHeader {
            tag: TLV_NDEF,
            encoding: LengthEncoding::Short(data[LOCKED_NDEF_OFFSET + 1]),
            payload_start: LOCKED_NDEF_OFFSET + 2,
        });
    }

    Err(FormatError::NoNdefTlv)
}

// 0xFF is both the literal length 255 and the 3-byte length escape. Pick the
// reading that gives a plausible length, and never read the start of an
// adjacent TLV as length bytes.
fn resolve_escape(hi: u8, lo: u8, config: &ReaderConfig) -> LengthEncoding {
    if hi == TLV_NDEF {
        if lo > 0 && lo as u16 <= config.second_tlv_max_length {
            return LengthEncoding::Ambiguous(Resolution::SecondTlv(lo));
        }
        return LengthEncoding::Ambiguous(Resolution::Literal);
    }

    let candidate = u16::from_be_bytes([hi, lo]);
    if candidate > 254 && candidate <= config.max_extended_length {
        LengthEncoding::Extended(candidate)
    } else {
        LengthEncoding::Ambiguous(Resolution::Literal)
    }
}
