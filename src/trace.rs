// src/trace.rs
use log::{debug, warn};

use crate::tlv::TlvHeader;

/// Notable steps of a decode, for logging or assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    WindowRead { page: u8, bytes: Vec<u8> },
    NotFormatted { reason: String },
    TlvResolved { header: TlvHeader },
    BulkReadFailed { page: u8, requested: usize },
    FallbackTierEngaged { tier: usize, chunk: usize },
    ReadDegraded { gained: usize, target: usize },
    TlvConsistent,
    RecordFound { offset: usize, expected: usize, available: usize },
    RecordCompletionRead { page: u8, requested: usize },
    PartialRecordAccepted { offset: usize, expected: usize, available: usize },
    FragmentsMerged { count: usize, length: usize },
    Truncated { declared: usize, available: usize },
}

pub trait TraceSink {
    fn event(&mut self, event: TraceEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTrace;

impl TraceSink for LogTrace {
    fn event(&mut self, event: TraceEvent) {
        match event {
            TraceEvent::WindowRead { page, bytes } => {
                debug!("Read from page {}: {}", page, hex::encode_upper(&bytes))
            }
            TraceEvent::NotFormatted { reason } => warn!("{}", reason),
            TraceEvent::TlvResolved { header } => debug!(
                "NDEF TLV: {:?}, length={}, start={}",
                header.encoding,
                header.length(),
                header.payload_start
            ),
            TraceEvent::BulkReadFailed { page, requested } => {
                warn!("Bulk read of {} bytes at page {} failed", requested, page)
            }
            TraceEvent::FallbackTierEngaged { tier, chunk } => {
                warn!("Fallback tier {} engaged ({} byte chunks)", tier, chunk)
            }
            TraceEvent::ReadDegraded { gained, target } => {
                warn!("Only {} of {} bytes could be read", gained, target)
            }
            TraceEvent::TlvConsistent => debug!("TLV length matches tag content"),
            TraceEvent::RecordFound {
                offset,
                expected,
                available,
            } => debug!(
                "Record header at {}: {} bytes expected, {} available",
                offset, expected, available
            ),
            TraceEvent::RecordCompletionRead { page, requested } => {
                debug!("Reading {} more bytes at page {} to complete record", requested, page)
            }
            TraceEvent::PartialRecordAccepted {
                offset,
                expected,
                available,
            } => warn!(
                "Accepting incomplete record at {}: {}/{} bytes",
                offset, available, expected
            ),
            TraceEvent::FragmentsMerged { count, length } => {
                debug!("Merged {} TLV fragments into {} bytes", count, length)
            }
            TraceEvent::Truncated {
                declared,
                available,
            } => warn!(
                "Not enough data for full message, truncating {} to {} bytes",
                declared, available
            ),
        }
    }
}

impl TraceSink for Vec<TraceEvent> {
    fn event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

/// Discards everything.
impl TraceSink for () {
    fn event(&mut self, _event: TraceEvent) {}
}

impl<T: TraceSink + ?Sized> TraceSink for &mut T {
    fn event(&mut self, event: TraceEvent) {
        (**self).event(event);
    }
}
