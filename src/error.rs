// src/error.rs
use thiserror::Error;

/// Failure of a single command/response exchange with the tag.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The reader answered but the status byte/word was not a success code.
    #[error("Tag NAK, status 0x{status:02X}")]
    Nak { status: u8 },
    /// The exchange itself failed (reader gone, card lifted, driver error).
    #[error("Transmit error: {0}")]
    Transmit(String),
    /// Requested page lies past the addressable range of the tag.
    #[error("Page {page} out of range")]
    OutOfRange { page: u16 },
}

/// Why the data region could not be interpreted as an NDEF TLV.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// First data page reads back as all 0xFF.
    #[error("Tag is not NDEF formatted")]
    Unformatted,
    /// Not enough bytes to decide.
    #[error("Data region too short to locate TLV ({len} bytes)")]
    TooShort { len: usize },
    /// Neither of the known NDEF TLV positions carries tag 0x03.
    #[error("No NDEF TLV found")]
    NoNdefTlv,
}

/// Write path failures. All are fatal to the write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The wrapped message does not fit. Nothing was written.
    #[error("Message length exceeds tag capacity {required} > {capacity}")]
    Capacity { required: usize, capacity: usize },
    /// A page write failed. Pages before `page` may already hold new data.
    #[error("Error writing page {page}: {source}")]
    Page { page: u8, source: ChannelError },
    /// The buffer would run past the last addressable page.
    #[error("Buffer of {pages} pages runs past the last tag page")]
    PageOverflow { pages: usize },
    /// Longer than a 3-byte TLV length can express.
    #[error("Message of {length} bytes does not fit a TLV length field")]
    MessageTooLong { length: usize },
    #[error(transparent)]
    Encode(#[from] NdefError),
}

/// Malformed NDEF record data, on parse or encode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("NDEF error: {0}")]
pub struct NdefError(pub String);
