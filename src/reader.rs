// src/reader.rs
use crate::channel::PageChannel;
use crate::config::ReaderConfig;
use crate::error::ChannelError;
use crate::tlv::TlvHeader;
use crate::trace::{TraceEvent, TraceSink};
use crate::window::MemoryWindow;

/// Read `want` bytes from `page`, dropping whatever the channel returned past
/// that from the tail.
pub(crate) fn fetch<C>(channel: &mut C, page: u8, want: usize) -> Result<Vec<u8>, ChannelError>
where
    C: PageChannel + ?Sized,
{
    let request = want.min(u16::MAX as usize) as u16;
    let mut bytes = channel.read_pages(page, request)?;
    bytes.truncate(want);
    Ok(bytes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Everything asked for was read.
    Complete { gained: usize },
    /// Reads failed part way, but past the partial threshold.
    Partial { gained: usize },
    /// Reads failed below the threshold, possibly with nothing gained.
    /// Decoding carries on with the window as it is.
    Degraded { gained: usize },
}

impl ReadOutcome {
    pub fn gained(&self) -> usize {
        match *self {
            ReadOutcome::Complete { gained }
            | ReadOutcome::Partial { gained }
            | ReadOutcome::Degraded { gained } => gained,
        }
    }
}

pub struct IncrementalReader<'a> {
    config: &'a ReaderConfig,
}

impl<'a> IncrementalReader<'a> {
    pub fn new(config: &'a ReaderConfig) -> Self {
        IncrementalReader { config }
    }

    /// Bytes to request beyond `already_read`. Declared lengths on this tag
    /// family are often short of the truth, so never less than the floor.
    pub fn target(&self, header: &TlvHeader, already_read: usize) -> usize {
        header
            .end()
            .saturating_sub(already_read)
            .max(self.config.read_floor)
    }

    /// Grow `window` by `target` bytes: one bulk read, then the fallback
    /// chunk tiers from wherever the window ends.
    pub fn fill<C, T>(
        &self,
        channel: &mut C,
        window: &mut MemoryWindow,
        target: usize,
        trace: &mut T,
    ) -> ReadOutcome
    where
        C: PageChannel + ?Sized,
        T: TraceSink + ?Sized,
    {
        if target == 0 {
            return ReadOutcome::Complete { gained: 0 };
        }

        let mut gained = 0;
        if let Some(page) = window.next_page() {
            match fetch(channel, page, target) {
                Ok(bytes) => {
                    gained += window.splice(page, &bytes);
                    trace.event(TraceEvent::WindowRead { page, bytes });
                    if gained >= target {
                        return ReadOutcome::Complete { gained };
                    }
                }
                Err(_) => trace.event(TraceEvent::BulkReadFailed {
                    page,
                    requested: target,
                }),
            }
        }

        'tiers: for (tier, chunk) in self.config.chunks_below(target).into_iter().enumerate() {
            if gained >= target {
                break;
            }
            trace.event(TraceEvent::FallbackTierEngaged {
                tier: tier + 1,
                chunk,
            });
            while gained < target {
                let Some(page) = window.next_page() else {
                    break 'tiers;
                };
                let bytes = match fetch(channel, page, chunk.min(target - gained)) {
                    Ok(bytes) if !bytes.is_empty() => bytes,
                    _ => break,
                };
                let grew = window.splice(page, &bytes);
                trace.event(TraceEvent::WindowRead { page, bytes });
                if grew == 0 {
                    break;
                }
                gained += grew;
            }
        }

        if gained >= target {
            ReadOutcome::Complete { gained }
        } else if gained >= target.min(self.config.partial_threshold) {
            ReadOutcome::Partial { gained }
        } else {
            trace.event(TraceEvent::ReadDegraded { gained, target });
            ReadOutcome::Degraded { gained }
        }
    }
}
