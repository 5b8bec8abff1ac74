// src/record.rs
use std::ops::Range;

use crate::channel::PageChannel;
use crate::config::{ReaderConfig, TLV_NDEF, TLV_TERMINATOR};
use crate::ndef::{self, FLAG_SR, TNF_MASK};
use crate::reader::fetch;
use crate::tlv::TlvHeader;
use crate::trace::{TraceEvent, TraceSink};
use crate::window::MemoryWindow;

/// The three leading bytes of a short record, as seen by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdefRecordHeader {
    pub flags: u8,
    pub type_length: u8,
    pub payload_length: u8,
}

impl NdefRecordHeader {
    pub fn at(data: &[u8], offset: usize) -> Option<Self> {
        match data.get(offset..offset + 3)? {
            &[flags, type_length, payload_length] => Some(NdefRecordHeader {
                flags,
                type_length,
                payload_length,
            }),
            _ => None,
        }
    }

    pub fn tnf(&self) -> u8 {
        self.flags & TNF_MASK
    }

    pub fn is_short(&self) -> bool {
        self.flags & FLAG_SR != 0
    }

    pub fn is_plausible(&self, config: &ReaderConfig) -> bool {
        self.tnf() <= config.record_tnf_max
            && self.is_short()
            && self.type_length <= config.record_type_max
            && self.payload_length > 0
            && self.payload_length < config.record_payload_max
    }

    /// Short record without an ID field.
    pub fn expected_record_size(&self) -> usize {
        3 + self.type_length as usize + self.payload_length as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordMatch {
    pub offset: usize,
    pub header: NdefRecordHeader,
}

impl RecordMatch {
    pub fn expected(&self) -> usize {
        self.header.expected_record_size()
    }

    pub fn end(&self) -> usize {
        self.offset + self.expected()
    }
}

/// Best-effort message location that replaces the TLV's own length/offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconstruction {
    Record {
        offset: usize,
        length: usize,
        complete: bool,
    },
    Merged(Vec<u8>),
}

/// True when the located TLV can be taken at its word: the terminator sits
/// right after the declared span, or the record chain in the span ends
/// exactly at its end.
pub fn tlv_is_consistent(data: &[u8], header: &TlvHeader) -> bool {
    if data.get(header.end()) == Some(&TLV_TERMINATOR) {
        return true;
    }
    match data.get(header.payload_start..header.end()) {
        Some(span) => ndef::message_length(span) == Some(span.len()),
        None => false,
    }
}

pub struct RecordReconstructor<'a> {
    config: &'a ReaderConfig,
}

impl<'a> RecordReconstructor<'a> {
    pub fn new(config: &'a ReaderConfig) -> Self {
        RecordReconstructor { config }
    }

    /// First offset at or after `from` at which a plausible short-record
    /// header starts. Callers pass the TLV payload start so lock or other
    /// TLV bytes in front of it are never taken for a record.
    pub fn scan(&self, data: &[u8], from: usize) -> Option<RecordMatch> {
        self.scan_from(data, from)
    }

    fn scan_from(&self, data: &[u8], from: usize) -> Option<RecordMatch> {
        (from..data.len()).find_map(|offset| {
            NdefRecordHeader::at(data, offset)
                .filter(|h| h.is_plausible(self.config))
                .map(|header| RecordMatch { offset, header })
        })
    }

    /// Record range for a match that is already fully inside `data`,
    /// stretched over the following records of the same message.
    pub fn complete_record(&self, data: &[u8], found: RecordMatch) -> Reconstruction {
        let length = ndef::message_length(&data[found.offset..])
            .filter(|&n| n >= found.expected())
            .unwrap_or(found.expected());
        Reconstruction::Record {
            offset: found.offset,
            length,
            complete: true,
        }
    }

    /// Read past the end of the window until the record is whole.
    ///
    /// One read of the missing bytes plus a safety margin first, then the
    /// smaller fallback chunks. While the record is still cut, every read's
    /// new bytes are searched for a header of exactly the expected size; the
    /// first one found replaces the current match. When the tag runs dry the
    /// current match is returned with `complete: false`.
    pub fn complete<C, T>(
        &self,
        channel: &mut C,
        window: &mut MemoryWindow,
        found: RecordMatch,
        trace: &mut T,
    ) -> Reconstruction
    where
        C: PageChannel + ?Sized,
        T: TraceSink + ?Sized,
    {
        let expected = found.expected();
        if window.data().len() >= found.end() {
            return self.complete_record(window.data(), found);
        }

        let mut current = found;
        let first = found.end() - window.data().len() + self.config.record_safety_margin;
        let mut plan = vec![(first, false)];
        plan.extend(self.config.chunks_below(first).into_iter().map(|c| (c, true)));

        'plan: for (size, repeat) in plan {
            loop {
                let Some(page) = window.next_page() else {
                    break 'plan;
                };
                trace.event(TraceEvent::RecordCompletionRead {
                    page,
                    requested: size,
                });
                let bytes = match fetch(channel, page, size) {
                    Ok(bytes) if !bytes.is_empty() => bytes,
                    _ => break,
                };
                // a header may straddle the old end of the window
                let fresh = window.data().len().saturating_sub(2);
                if window.splice(page, &bytes) == 0 {
                    break;
                }
                trace.event(TraceEvent::WindowRead { page, bytes });

                let data = window.data();
                if data.len() < current.end() {
                    if let Some(exact) = self.same_size(data, fresh.max(current.offset + 1), expected) {
                        trace.event(TraceEvent::RecordFound {
                            offset: exact.offset,
                            expected,
                            available: data.len() - exact.offset,
                        });
                        current = exact;
                    }
                }
                if data.len() >= current.end() {
                    return self.complete_record(data, current);
                }
                if !repeat {
                    break;
                }
            }
        }

        let available = window.data().len().saturating_sub(current.offset);
        trace.event(TraceEvent::PartialRecordAccepted {
            offset: current.offset,
            expected,
            available,
        });
        Reconstruction::Record {
            offset: current.offset,
            length: available,
            complete: false,
        }
    }

    fn same_size(&self, data: &[u8], from: usize, expected: usize) -> Option<RecordMatch> {
        let mut from = from;
        while let Some(m) = self.scan_from(data, from) {
            if m.expected() == expected {
                return Some(m);
            }
            from = m.offset + 1;
        }
        None
    }

    /// Payload ranges of every `03 LL` envelope that fits inside `data`.
    pub fn fragments(&self, data: &[u8]) -> Vec<Range<usize>> {
        let mut found = Vec::new();
        let mut i = 0;
        while i + 1 < data.len() {
            let len = data[i + 1] as usize;
            let end = i + 2 + len;
            if data[i] == TLV_NDEF
                && len >= 1
                && len <= self.config.fragment_length_max as usize
                && end <= data.len()
            {
                found.push(i + 2..end);
                i = end;
            } else {
                i += 1;
            }
        }
        found
    }

    /// Concatenate fragment payloads from the first one on, adding more only
    /// while the total is short of `expected`.
    pub fn merge_fragments(&self, data: &[u8], expected: usize) -> Option<(Vec<u8>, usize)> {
        let fragments = self.fragments(data);
        let (first, rest) = fragments.split_first()?;

        let mut merged = data[first.clone()].to_vec();
        let mut count = 1;
        for range in rest {
            if merged.len() >= expected {
                break;
            }
            merged.extend_from_slice(&data[range.clone()]);
            count += 1;
        }
        Some((merged, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::MemoryTag;
    use crate::tlv::LengthEncoding;

    fn header(start: usize, len: u8) -> TlvHeader {
        TlvHeader {
            tag: TLV_NDEF,
            encoding: LengthEncoding::Short(len),
            payload_start: start,
        }
    }

    #[test]
    fn predicate_bounds() {
        let cfg = ReaderConfig::default();
        let ok = |flags, tl, pl| {
            NdefRecordHeader {
                flags,
                type_length: tl,
                payload_length: pl,
            }
            .is_plausible(&cfg)
        };
        assert!(ok(0xD1, 1, 9));
        assert!(ok(0x16, 8, 199));
        assert!(!ok(0x17, 1, 9)); // TNF 7
        assert!(!ok(0xC1, 1, 9)); // SR clear
        assert!(!ok(0xD1, 9, 9));
        assert!(!ok(0xD1, 1, 0));
        assert!(!ok(0xD1, 1, 200));
    }

    #[test]
    fn scan_skips_tlv_bytes() {
        let cfg = ReaderConfig::default();
        let data = [0x03, 0x0D, 0xD1, 0x01, 0x09, b'T', 0x02, b'e', b'n'];
        let m = RecordReconstructor::new(&cfg).scan(&data, 0).unwrap();
        assert_eq!(m.offset, 2);
        assert_eq!(m.expected(), 13);
    }

    #[test]
    fn scan_from_payload_start_skips_lock_tlv() {
        let cfg = ReaderConfig::default();
        let data = [0x01, 0x03, 0xA0, 0x0C, 0x34, 0x03, 0x04, 0xD1, 0x01, 0x02, b'U', 0x01, b'a'];
        let recon = RecordReconstructor::new(&cfg);
        // 34 03 04 reads as a TNF 4 short record
        assert_eq!(recon.scan(&data, 0).unwrap().offset, 4);
        assert_eq!(recon.scan(&data, 7).unwrap().offset, 7);
    }

    #[test]
    fn consistency_by_terminator_or_chain() {
        let mut data = vec![0x03, 0x04, 1, 2, 3, 4, 0xFE];
        assert!(tlv_is_consistent(&data, &header(2, 4)));
        data[6] = 0x00;
        assert!(!tlv_is_consistent(&data, &header(2, 4)));

        let record = [0xD1, 0x01, 0x01, b'T', 0x00];
        let mut data = vec![0x03, 0x05];
        data.extend_from_slice(&record);
        data.extend_from_slice(&[0x00; 9]);
        assert!(tlv_is_consistent(&data, &header(2, 5)));
        assert!(!tlv_is_consistent(&data, &header(2, 7)));
        assert!(!tlv_is_consistent(&data, &header(2, 200)));
    }

    #[test]
    fn completes_record_with_one_read() {
        let cfg = ReaderConfig::default();
        let mut memory = vec![0u8; 48];
        let record = [0xD1, 0x01, 0x09, b'T', 0x02, b'e', b'n', b'a', b'b', b'c', b'd', b'e', b'f'];
        memory[10..23].copy_from_slice(&record);
        let mut tag = MemoryTag::with_data(&memory);
        let mut window = MemoryWindow::from_bytes(4, memory[..21].to_vec());

        let recon = RecordReconstructor::new(&cfg);
        let found = recon.scan(window.data(), 0).unwrap();
        assert_eq!(found.offset, 10);
        assert_eq!(found.expected(), 13);

        let mut events = Vec::new();
        let result = recon.complete(&mut tag, &mut window, found, &mut events);
        assert_eq!(tag.reads(), &[(9, 2 + cfg.record_safety_margin as u16)]);
        assert_eq!(
            result,
            Reconstruction::Record {
                offset: 10,
                length: 13,
                complete: true
            }
        );
        assert_eq!(&window.data()[10..23], &record);
    }

    #[test]
    fn keeps_partial_record_when_tag_runs_dry() {
        let cfg = ReaderConfig::default();
        let mut memory = vec![0u8; 32];
        memory[10..13].copy_from_slice(&[0xD1, 0x01, 0x40]);
        // only the first 5 data pages can be read
        let mut tag = MemoryTag::with_data(&memory).readable_pages(9);
        let mut window = MemoryWindow::from_bytes(4, memory[..20].to_vec());
        let recon = RecordReconstructor::new(&cfg);
        let found = recon.scan(window.data(), 0).unwrap();

        let mut events = Vec::new();
        let result = recon.complete(&mut tag, &mut window, found, &mut events);
        assert_eq!(
            result,
            Reconstruction::Record {
                offset: 10,
                length: 10,
                complete: false
            }
        );
        // single sized read, then every fallback tier once
        assert_eq!(tag.reads().len(), 1 + cfg.chunks_below(66).len());
        assert!(events.iter().any(|e| matches!(
            e,
            TraceEvent::PartialRecordAccepted {
                expected: 68,
                available: 10,
                ..
            }
        )));
    }

    // 11 01 09 at 0 is noise; the real 13-byte record starts at 6
    fn shadowed_record() -> Vec<u8> {
        let mut memory = vec![0x11, 0x01, 0x09, 0x00, 0x00, 0x00];
        memory.extend_from_slice(&[0xD1, 0x01, 0x09, b'T', 0x02, b'e', b'n']);
        memory.extend_from_slice(b"abcdef");
        memory.push(0xFE);
        memory
    }

    fn small_chunks() -> ReaderConfig {
        ReaderConfig {
            fallback_chunks: vec![4],
            ..ReaderConfig::default()
        }
    }

    #[test]
    fn same_size_header_in_new_bytes_replaces_match() {
        let cfg = small_chunks();
        let memory = shadowed_record();
        // 12 data bytes readable
        let mut tag = MemoryTag::with_data(&memory).readable_pages(10);
        let mut window = MemoryWindow::from_bytes(4, memory[..4].to_vec());
        let recon = RecordReconstructor::new(&cfg);
        let found = recon.scan(window.data(), 0).unwrap();
        assert_eq!(found.offset, 0);

        let mut events = Vec::new();
        let result = recon.complete(&mut tag, &mut window, found, &mut events);
        assert_eq!(
            result,
            Reconstruction::Record {
                offset: 6,
                length: 6,
                complete: false
            }
        );
        assert_eq!(tag.reads(), &[(5, 17), (5, 4), (6, 4), (7, 4)]);
        assert!(events.contains(&TraceEvent::RecordFound {
            offset: 6,
            expected: 13,
            available: 6
        }));
    }

    #[test]
    fn replacement_match_is_read_to_completion() {
        let cfg = small_chunks();
        let memory = shadowed_record();
        let mut tag = MemoryTag::with_data(&memory).readable_pages(12);
        let mut window = MemoryWindow::from_bytes(4, memory[..4].to_vec());
        let recon = RecordReconstructor::new(&cfg);
        let found = recon.scan(window.data(), 0).unwrap();

        let result = recon.complete(&mut tag, &mut window, found, &mut ());
        assert_eq!(
            result,
            Reconstruction::Record {
                offset: 6,
                length: 13,
                complete: true
            }
        );
        assert_eq!(&window.data()[6..19], &memory[6..19]);
    }

    #[test]
    fn merges_split_envelopes() {
        let cfg = ReaderConfig::default();
        let data = [
            0x03, 0x03, 0xAA, 0xBB, 0xCC, 0x03, 0x02, 0xDD, 0xEE, 0xFE, 0x00, 0x00,
        ];
        let recon = RecordReconstructor::new(&cfg);
        assert_eq!(recon.fragments(&data), vec![2..5, 7..9]);
        let (merged, count) = recon.merge_fragments(&data, 5).unwrap();
        assert_eq!(merged, vec![0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
        assert_eq!(count, 2);
        let (merged, count) = recon.merge_fragments(&data, 3).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(count, 1);
    }

    #[test]
    fn oversized_fragment_is_ignored() {
        let cfg = ReaderConfig::default();
        let data = [0x03, 0x40, 0x01, 0x02];
        assert!(RecordReconstructor::new(&cfg).merge_fragments(&data, 10).is_none());
    }
}
