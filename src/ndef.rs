// src/ndef.rs
use std::str;

use crate::error::NdefError;

// Type Name Format values
pub const TNF_EMPTY: u8 = 0x00;
pub const TNF_WELL_KNOWN: u8 = 0x01;
pub const TNF_MEDIA: u8 = 0x02;
pub const TNF_ABSOLUTE_URI: u8 = 0x03;
pub const TNF_EXTERNAL: u8 = 0x04;

// Header flag bits
pub const FLAG_MB: u8 = 0x80;
pub const FLAG_ME: u8 = 0x40;
pub const FLAG_CF: u8 = 0x20;
pub const FLAG_SR: u8 = 0x10;
pub const FLAG_IL: u8 = 0x08;
pub const TNF_MASK: u8 = 0x07;

// URI identifier codes (NFC Forum URI RTD), index = code
const URI_PREFIXES: [&str; 36] = [
    "",
    "http://www.",
    "https://www.",
    "http://",
    "https://",
    "tel:",
    "mailto:",
    "ftp://anonymous:anonymous@",
    "ftp://ftp.",
    "ftps://",
    "sftp://",
    "smb://",
    "nfs://",
    "ftp://",
    "dav://",
    "news:",
    "telnet://",
    "imap:",
    "rtsp://",
    "urn:",
    "pop:",
    "sip:",
    "sips:",
    "tftp:",
    "btspp://",
    "btl2cap://",
    "btgoep://",
    "tcpobex://",
    "irdaobex://",
    "file://",
    "urn:epc:id:",
    "urn:epc:tag:",
    "urn:epc:pat:",
    "urn:epc:raw:",
    "urn:epc:",
    "urn:nfc:",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    pub tnf: u8, // Type Name Format (How to interpret the type)
    pub record_type: Vec<u8>,
    pub id: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

impl NdefRecord {
    pub fn new(tnf: u8, record_type: &[u8], payload: Vec<u8>) -> Self {
        NdefRecord {
            tnf,
            record_type: record_type.to_vec(),
            id: None,
            payload,
        }
    }

    /// Text record: [Status Byte] + [Lang Code] + [Text]
    pub fn text(text: &str, lang: &str) -> Self {
        let lang = lang.as_bytes();
        let mut payload = Vec::with_capacity(1 + lang.len() + text.len());
        // Bit 7=0 (UTF-8), Bits 5-0 = lang length
        payload.push((lang.len() as u8) & 0x3F);
        payload.extend_from_slice(lang);
        payload.extend_from_slice(text.as_bytes());
        Self::new(TNF_WELL_KNOWN, b"T", payload)
    }

    /// URI record, abbreviated with the longest matching prefix code.
    pub fn uri(uri: &str) -> Self {
        let (code, prefix) = URI_PREFIXES
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, p)| uri.starts_with(**p))
            .max_by_key(|(_, p)| p.len())
            .map(|(i, p)| (i as u8, *p))
            .unwrap_or((0, ""));
        let mut payload = vec![code];
        payload.extend_from_slice(uri[prefix.len()..].as_bytes());
        Self::new(TNF_WELL_KNOWN, b"U", payload)
    }

    /// Android Application Record: just the package name.
    pub fn android_app(package: &str) -> Self {
        Self::external(b"android.com:pkg", package.as_bytes().to_vec())
    }

    pub fn external(record_type: &[u8], payload: Vec<u8>) -> Self {
        Self::new(TNF_EXTERNAL, record_type, payload)
    }

    pub fn is_text(&self) -> bool {
        self.tnf == TNF_WELL_KNOWN && self.record_type == b"T"
    }

    pub fn is_uri(&self) -> bool {
        self.tnf == TNF_WELL_KNOWN && self.record_type == b"U"
    }

    pub fn text_content(&self) -> Option<String> {
        if !self.is_text() {
            return None;
        }
        let status_byte = *self.payload.first()?;
        // UTF-16 text is not produced by any writer we care about
        if status_byte & 0x80 != 0 {
            return None;
        }
        let lang_code_len = (status_byte & 0x3F) as usize; // Bit 5-0 is length
        let text_bytes = self.payload.get(1 + lang_code_len..)?;
        str::from_utf8(text_bytes).ok().map(|s| s.to_string())
    }

    pub fn uri_content(&self) -> Option<String> {
        if !self.is_uri() {
            return None;
        }
        let (&code, rest) = self.payload.split_first()?;
        let prefix = URI_PREFIXES.get(code as usize).copied().unwrap_or("");
        let rest = str::from_utf8(rest).ok()?;
        Some(format!("{}{}", prefix, rest))
    }

    fn encode_into(&self, out: &mut Vec<u8>, mb: bool, me: bool) -> Result<(), NdefError> {
        let type_len = u8::try_from(self.record_type.len()).map_err(|_| {
            NdefError(format!("Record type of {} bytes is too long", self.record_type.len()))
        })?;
        let id_len = match &self.id {
            Some(id) => Some(
                u8::try_from(id.len())
                    .map_err(|_| NdefError(format!("Record id of {} bytes is too long", id.len())))?,
            ),
            None => None,
        };
        let payload_len = u32::try_from(self.payload.len()).map_err(|_| {
            NdefError(format!("Payload of {} bytes is too long", self.payload.len()))
        })?;

        // Bit 7: MB, Bit 6: ME, Bit 5: CF(0), Bit 4: SR, Bit 3: IL, Bits 2-0: TNF
        let mut header = self.tnf & TNF_MASK;
        if mb {
            header |= FLAG_MB;
        }
        if me {
            header |= FLAG_ME;
        }
        let short = self.payload.len() < 256;
        if short {
            header |= FLAG_SR;
        }
        if id_len.is_some() {
            header |= FLAG_IL;
        }

        out.push(header);
        out.push(type_len);
        if short {
            out.push(payload_len as u8);
        } else {
            out.extend_from_slice(&payload_len.to_be_bytes());
        }
        if let Some(len) = id_len {
            out.push(len);
        }
        out.extend_from_slice(&self.record_type);
        if let Some(id) = &self.id {
            out.extend_from_slice(id);
        }
        out.extend_from_slice(&self.payload);
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NdefMessage {
    pub records: Vec<NdefRecord>,
}

impl NdefMessage {
    pub fn new(records: Vec<NdefRecord>) -> Self {
        NdefMessage { records }
    }

    /// Fails when a type or id is longer than its 1-byte length field.
    pub fn encode(&self) -> Result<Vec<u8>, NdefError> {
        let mut full_message = Vec::new();
        for (i, record) in self.records.iter().enumerate() {
            let mb = i == 0;
            let me = i == self.records.len() - 1;
            record.encode_into(&mut full_message, mb, me)?;
        }
        Ok(full_message)
    }

    pub fn parse(data: &[u8]) -> Result<Self, NdefError> {
        let mut records = Vec::new();
        let mut cursor = 0;

        while cursor < data.len() {
            let layout = RecordLayout::read(data, cursor)?;
            let mut at = cursor + layout.header_len;

            let record_type = data[at..at + layout.type_len].to_vec();
            at += layout.type_len;

            let id = if layout.flags & FLAG_IL != 0 {
                let val = data[at..at + layout.id_len].to_vec();
                at += layout.id_len;
                Some(val)
            } else {
                None
            };

            let payload = data[at..at + layout.payload_len].to_vec();
            cursor += layout.total();

            records.push(NdefRecord {
                tnf: layout.flags & TNF_MASK,
                record_type,
                id,
                payload,
            });

            if layout.is_message_end() {
                break;
            }
        }

        if records.is_empty() {
            return Err(NdefError("Empty NDEF message".into()));
        }
        Ok(NdefMessage { records })
    }

    /// First text record's content, if any.
    pub fn text(&self) -> Option<String> {
        self.records.iter().find_map(NdefRecord::text_content)
    }
}

/// Field sizes of one record, bounds-checked against the buffer it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecordLayout {
    pub flags: u8,
    pub header_len: usize,
    pub type_len: usize,
    pub id_len: usize,
    pub payload_len: usize,
}

impl RecordLayout {
    pub fn read(data: &[u8], at: usize) -> Result<Self, NdefError> {
        let byte = |i: usize| {
            data.get(at + i)
                .copied()
                .ok_or_else(|| NdefError(format!("Record at {} cut short", at)))
        };

        let flags = byte(0)?;
        let type_len = byte(1)? as usize;
        let mut header_len = 2;

        // Payload Length: 1 byte for Short Record, 4 bytes otherwise
        let payload_len = if flags & FLAG_SR != 0 {
            header_len += 1;
            byte(2)? as usize
        } else {
            header_len += 4;
            u32::from_be_bytes([byte(2)?, byte(3)?, byte(4)?, byte(5)?]) as usize
        };

        let id_len = if flags & FLAG_IL != 0 {
            let len = byte(header_len)? as usize;
            header_len += 1;
            len
        } else {
            0
        };

        let layout = RecordLayout {
            flags,
            header_len,
            type_len,
            id_len,
            payload_len,
        };
        if at + layout.total() > data.len() {
            return Err(NdefError(format!(
                "Record at {} needs {} bytes, {} available",
                at,
                layout.total(),
                data.len() - at
            )));
        }
        Ok(layout)
    }

    pub fn total(&self) -> usize {
        self.header_len + self.type_len + self.id_len + self.payload_len
    }

    pub fn is_message_end(&self) -> bool {
        self.flags & FLAG_ME != 0
    }
}

/// Length of the record chain at the start of `data`, through the record
/// carrying ME. None when the chain is malformed or runs off the end.
pub fn message_length(data: &[u8]) -> Option<usize> {
    let mut cursor = 0;
    while cursor < data.len() {
        let layout = RecordLayout::read(data, cursor).ok()?;
        cursor += layout.total();
        if layout.is_message_end() {
            return Some(cursor);
        }
    }
    None
}
