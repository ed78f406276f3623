//! One contiguous byte interval of the upstream resource.

use bytes::Bytes;
use parking_lot::Mutex;

/// A planned byte interval with a fill-once / take-once payload slot.
///
/// Created empty by the planner, populated exactly once by its owning
/// worker, consumed exactly once by the reader.
#[derive(Debug)]
pub struct Chunk {
    start: u64,
    end: u64,
    slot: Mutex<Option<Bytes>>,
}

impl Chunk {
    #[must_use]
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self {
            start,
            end,
            slot: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Interval length in bytes; never zero.
    #[must_use]
    pub fn span_len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Deposit the fetched payload. `payload.len()` must equal
    /// [`span_len`](Self::span_len).
    pub fn fill(&self, payload: Bytes) {
        debug_assert_eq!(payload.len() as u64, self.span_len());
        *self.slot.lock() = Some(payload);
    }

    /// Consume the payload, or `None` while the fetch is still in flight.
    #[must_use]
    pub fn take(&self) -> Option<Bytes> {
        self.slot.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_then_take_is_once() {
        let chunk = Chunk::new(100, 199);
        assert_eq!(chunk.span_len(), 100);
        assert!(chunk.take().is_none());

        chunk.fill(Bytes::from(vec![7u8; 100]));
        let payload = chunk.take().expect("filled payload");
        assert_eq!(payload.len(), 100);

        // Consumed exactly once.
        assert!(chunk.take().is_none());
    }

    #[test]
    fn single_byte_interval() {
        let chunk = Chunk::new(5, 5);
        assert_eq!(chunk.span_len(), 1);
    }
}
