// src/decode.rs
use std::fmt;
use std::mem;

use serde::Serialize;

use crate::assemble::assemble;
use crate::channel::PageChannel;
use crate::config::{READ_GRANULARITY, ReaderConfig};
use crate::error::NdefError;
use crate::ndef::NdefMessage;
use crate::reader::{IncrementalReader, fetch};
use crate::record::{Reconstruction, RecordMatch, RecordReconstructor, tlv_is_consistent};
use crate::tlv::{self, TlvHeader};
use crate::trace::{LogTrace, TraceEvent, TraceSink};
use crate::window::MemoryWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TagKind {
    #[serde(rename = "NFC Forum Type 2")]
    Type2,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagKind::Type2 => write!(f, "NFC Forum Type 2"),
        }
    }
}

/// Result of reading one presented tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTag {
    pub uid: Vec<u8>,
    pub kind: TagKind,
    /// None when the tag holds no usable NDEF TLV.
    pub message: Option<Vec<u8>>,
}

impl DecodedTag {
    pub fn ndef(&self) -> Option<Result<NdefMessage, NdefError>> {
        self.message
            .as_deref()
            .filter(|m| !m.is_empty())
            .map(NdefMessage::parse)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeState {
    LocatingTlv,
    AccumulatingReads { header: TlvHeader },
    ScanningForRecord { header: TlvHeader },
    CompletingPartialRecord { header: TlvHeader, found: RecordMatch },
    Assembled(Option<Vec<u8>>),
}

/// Read path as an explicit state machine, one transition per `step`.
pub struct Decoder<'a, C, T> {
    channel: C,
    config: &'a ReaderConfig,
    trace: T,
    window: MemoryWindow,
    state: DecodeState,
}

impl<'a, C, T> Decoder<'a, C, T>
where
    C: PageChannel,
    T: TraceSink,
{
    pub fn new(channel: C, config: &'a ReaderConfig, trace: T) -> Self {
        Decoder {
            channel,
            config,
            trace,
            window: MemoryWindow::new(),
            state: DecodeState::LocatingTlv,
        }
    }

    pub fn state(&self) -> &DecodeState {
        &self.state
    }

    pub fn window(&self) -> &MemoryWindow {
        &self.window
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, DecodeState::Assembled(_))
    }

    pub fn step(&mut self) -> &DecodeState {
        let state = mem::replace(&mut self.state, DecodeState::Assembled(None));
        self.state = match state {
            DecodeState::LocatingTlv => self.locate_tlv(),
            DecodeState::AccumulatingReads { header } => self.accumulate(header),
            DecodeState::ScanningForRecord { header } => self.scan(header),
            DecodeState::CompletingPartialRecord { header, found } => {
                self.complete_record(header, found)
            }
            done @ DecodeState::Assembled(_) => done,
        };
        &self.state
    }

    pub fn run(mut self) -> Option<Vec<u8>> {
        while !self.is_done() {
            self.step();
        }
        match self.state {
            DecodeState::Assembled(message) => message,
            _ => None,
        }
    }

    fn locate_tlv(&mut self) -> DecodeState {
        let page = self.window.start_page();
        match fetch(&mut self.channel, page, READ_GRANULARITY) {
            Ok(bytes) => {
                self.window.splice(page, &bytes);
                self.trace.event(TraceEvent::WindowRead { page, bytes });
            }
            Err(e) => {
                self.trace.event(TraceEvent::NotFormatted {
                    reason: format!("Error reading tag data: {}", e),
                });
                return DecodeState::Assembled(None);
            }
        }

        match tlv::locate(self.window.data(), self.config) {
            Ok(header) => {
                self.trace.event(TraceEvent::TlvResolved { header });
                if header.length() == 0 {
                    DecodeState::Assembled(Some(Vec::new()))
                } else {
                    DecodeState::AccumulatingReads { header }
                }
            }
            Err(e) => {
                self.trace.event(TraceEvent::NotFormatted {
                    reason: e.to_string(),
                });
                DecodeState::Assembled(None)
            }
        }
    }

    fn accumulate(&mut self, header: TlvHeader) -> DecodeState {
        let reader = IncrementalReader::new(self.config);
        let target = reader.target(&header, self.window.data().len());
        reader.fill(&mut self.channel, &mut self.window, target, &mut self.trace);
        DecodeState::ScanningForRecord { header }
    }

    fn scan(&mut self, header: TlvHeader) -> DecodeState {
        let data = self.window.data();
        if tlv_is_consistent(data, &header) {
            self.trace.event(TraceEvent::TlvConsistent);
            return self.finish(header, None);
        }

        let recon = RecordReconstructor::new(self.config);
        if let Some(found) = recon.scan(data, header.payload_start) {
            self.trace.event(TraceEvent::RecordFound {
                offset: found.offset,
                expected: found.expected(),
                available: data.len() - found.offset,
            });
            if found.end() <= data.len() {
                let record = recon.complete_record(data, found);
                return self.finish(header, Some(record));
            }
            return DecodeState::CompletingPartialRecord { header, found };
        }

        if let Some((merged, count)) = recon.merge_fragments(data, header.length()) {
            self.trace.event(TraceEvent::FragmentsMerged {
                count,
                length: merged.len(),
            });
            return self.finish(header, Some(Reconstruction::Merged(merged)));
        }

        self.finish(header, None)
    }

    fn complete_record(&mut self, header: TlvHeader, found: RecordMatch) -> DecodeState {
        let record = RecordReconstructor::new(self.config).complete(
            &mut self.channel,
            &mut self.window,
            found,
            &mut self.trace,
        );
        self.finish(header, Some(record))
    }

    fn finish(&mut self, header: TlvHeader, reconstruction: Option<Reconstruction>) -> DecodeState {
        let (start, declared) = match reconstruction {
            Some(Reconstruction::Merged(bytes)) => return DecodeState::Assembled(Some(bytes)),
            Some(Reconstruction::Record { offset, length, .. }) => (offset, length),
            None => (header.payload_start, header.length()),
        };

        let assembly = assemble(&self.window, start, declared);
        if let Some(a) = &assembly {
            if a.is_truncated() {
                self.trace.event(TraceEvent::Truncated {
                    declared,
                    available: a.bytes.len(),
                });
            }
        }
        DecodeState::Assembled(assembly.map(|a| a.bytes))
    }
}

/// Decode the tag on `channel`, logging through `log`.
pub fn read_tag<C: PageChannel>(channel: C, uid: Vec<u8>, config: &ReaderConfig) -> DecodedTag {
    read_tag_traced(channel, uid, config, LogTrace)
}

pub fn read_tag_traced<C, T>(channel: C, uid: Vec<u8>, config: &ReaderConfig, trace: T) -> DecodedTag
where
    C: PageChannel,
    T: TraceSink,
{
    let message = Decoder::new(channel, config, trace).run();
    DecodedTag {
        uid,
        kind: TagKind::Type2,
        message,
    }
}
