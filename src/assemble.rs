// src/assemble.rs
use crate::window::MemoryWindow;

/// Final message bytes cut out of the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub bytes: Vec<u8>,
    pub declared: usize,
}

impl Assembly {
    /// Fewer bytes were available than the length said.
    pub fn is_truncated(&self) -> bool {
        self.bytes.len() < self.declared
    }
}

/// Trim everything before `start` (relative to the first data page, so any
/// leading pages the window holds are skipped too), then fit the rest to
/// `declared`: excess tail bytes are dropped, a shortfall shrinks the result.
///
/// None when the window holds nothing at or after `start` for a non-empty
/// message.
pub fn assemble(window: &MemoryWindow, start: usize, declared: usize) -> Option<Assembly> {
    if declared == 0 {
        return Some(Assembly {
            bytes: Vec::new(),
            declared,
        });
    }

    let data = window.data();
    if data.len() <= start {
        return None;
    }

    let length = declared.min(data.len() - start);
    Some(Assembly {
        bytes: data[start..start + length].to_vec(),
        declared,
    })
}
