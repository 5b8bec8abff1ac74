// src/types.rs
#![allow(non_camel_case_types)]

use serde::{Deserialize, Serialize};

use nfc_type2::ndef::{NdefMessage, NdefRecord};
use nfc_type2::{DecodedTag, TagKind};

// Messages sent TO the WebSocket client (Frontend)
#[derive(Serialize, Clone, Debug)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    READER_STATUS { success: bool },
    CARD_STATUS { success: bool, message: String },
    TAG_READ(TagReport),
    DATA_READ_ERROR { error: String },
    DATA_WRITE_SUCCESS { message: String },
    DATA_WRITE_ERROR { error: String },
    READER_ERROR { error: String },
}

#[derive(Serialize, Clone, Debug)]
pub struct TagReport {
    pub uid: String,
    pub kind: TagKind,
    /// Raw NDEF message, hex encoded. None for unformatted tags.
    pub message: Option<String>,
    pub records: Vec<RecordReport>,
}

#[derive(Serialize, Clone, Debug)]
pub struct RecordReport {
    pub tnf: u8,
    pub record_type: String,
    pub text: Option<String>,
    pub payload: String,
}

impl From<&NdefRecord> for RecordReport {
    fn from(record: &NdefRecord) -> Self {
        RecordReport {
            tnf: record.tnf,
            record_type: String::from_utf8_lossy(&record.record_type).into_owned(),
            text: record.text_content().or_else(|| record.uri_content()),
            payload: hex::encode(&record.payload),
        }
    }
}

impl From<&DecodedTag> for TagReport {
    fn from(tag: &DecodedTag) -> Self {
        let records = match tag.ndef() {
            Some(Ok(message)) => message.records.iter().map(RecordReport::from).collect(),
            _ => Vec::new(),
        };
        TagReport {
            uid: hex::encode_upper(&tag.uid),
            kind: tag.kind,
            message: tag.message.as_ref().map(hex::encode),
            records,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub enum NDEFType {
    TEXT,
    URL,
    APP,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NdefPayload {
    pub data_type: NDEFType,
    pub content: String,
}

impl NdefPayload {
    pub fn to_record(&self) -> NdefRecord {
        match self.data_type {
            NDEFType::TEXT => NdefRecord::text(&self.content, "en"),
            NDEFType::URL => NdefRecord::uri(&self.content),
            NDEFType::APP => NdefRecord::android_app(&self.content),
        }
    }
}

pub fn build_message(payloads: &[NdefPayload]) -> NdefMessage {
    NdefMessage::new(payloads.iter().map(NdefPayload::to_record).collect())
}

// Messages received FROM the WebSocket client
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    GET_READER_STATUS,
    WRITE_RECORDS { payloads: Vec<NdefPayload> },
    ERASE_TAG,
}

// Internal commands sent from WS Server -> NFC Thread
#[derive(Debug)]
pub enum NfcCommand {
    Write { payloads: Vec<NdefPayload> },
    Erase,
    CheckReaderStatus,
}
