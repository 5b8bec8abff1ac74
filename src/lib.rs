//! NDEF read and write support for NFC Forum Type 2 tags.
//!
//! Reading goes through [`Decoder`]: locate the NDEF TLV in the first data
//! block, pull in the declared length with degrading bulk reads, then
//! reconstruct a record when the TLV length cannot be trusted. Writing wraps
//! an encoded message in a TLV and writes it page by page through
//! [`TagWriter`]. Both sides only talk to a [`PageChannel`].

#[cfg(feature = "pcsc")]
pub mod apdu;
pub mod assemble;
pub mod channel;
pub mod config;
pub mod decode;
pub mod error;
pub mod ndef;
pub mod reader;
pub mod record;
pub mod sim;
pub mod tlv;
pub mod trace;
pub mod window;
pub mod writer;

pub use channel::{PageChannel, read_in_blocks};
pub use config::{
    CAPABILITY_PAGE, DATA_START_PAGE, MAX_PAGE, PAGE_SIZE, READ_GRANULARITY, ReaderConfig,
};
pub use decode::{DecodeState, DecodedTag, Decoder, TagKind, read_tag, read_tag_traced};
pub use error::{ChannelError, FormatError, NdefError, WriteError};
pub use ndef::{NdefMessage, NdefRecord};
pub use tlv::{LengthEncoding, Resolution, TlvHeader};
pub use trace::{LogTrace, TraceEvent, TraceSink};
pub use window::MemoryWindow;
pub use writer::{TagWriter, required_capacity, wrap_in_tlv};
