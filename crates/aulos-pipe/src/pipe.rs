use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::errors::{PipeError, PipeResult};

#[derive(Debug)]
struct Shared {
    closed: RwLock<bool>,
    cancel: CancellationToken,
}

impl Shared {
    fn is_closed(&self) -> bool {
        *self.closed.read()
    }

    fn close(&self) {
        let mut closed = self.closed.write();
        if *closed {
            return;
        }
        *closed = true;
        self.cancel.cancel();
    }
}

/// Create a bounded byte pipe with room for `capacity` in-flight blocks.
///
/// # Panics
///
/// Panics if `capacity` is zero.
#[must_use]
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    assert!(capacity > 0, "pipe capacity must be at least 1");

    let (tx, rx) = mpsc::channel(capacity);
    let shared = Arc::new(Shared {
        closed: RwLock::new(false),
        cancel: CancellationToken::new(),
    });

    let writer = PipeWriter {
        tx,
        shared: Arc::clone(&shared),
    };
    let reader = PipeReader { rx, shared };
    (writer, reader)
}

/// Producer half of the pipe.
#[derive(Debug)]
pub struct PipeWriter {
    tx: mpsc::Sender<Bytes>,
    shared: Arc<Shared>,
}

impl PipeWriter {
    /// Append a block, waiting while the pipe is at capacity.
    ///
    /// Returns the number of bytes accepted, or [`PipeError::Closed`] once
    /// either half has closed the pipe.
    pub async fn write(&self, bytes: Bytes) -> PipeResult<usize> {
        if self.shared.is_closed() {
            return Err(PipeError::Closed);
        }

        let len = bytes.len();
        tokio::select! {
            biased;
            () = self.shared.cancel.cancelled() => Err(PipeError::Closed),
            sent = self.tx.send(bytes) => sent.map(|()| len).map_err(|_| PipeError::Closed),
        }
    }

    pub async fn write_str(&self, s: &str) -> PipeResult<usize> {
        self.write(Bytes::copy_from_slice(s.as_bytes())).await
    }

    /// Close the pipe. Idempotent; unblocks both halves.
    pub fn close(&self) {
        self.shared.close();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

/// Consumer half of the pipe.
#[derive(Debug)]
pub struct PipeReader {
    rx: mpsc::Receiver<Bytes>,
    shared: Arc<Shared>,
}

impl PipeReader {
    /// Next block, or an empty `Bytes` once the pipe has reached
    /// end-of-stream.
    ///
    /// Blocks written before `close` are still delivered; end-of-stream is
    /// close-with-empty (or a dropped writer with the buffer drained).
    pub async fn read(&mut self) -> Bytes {
        use tokio::sync::mpsc::error::TryRecvError;

        match self.rx.try_recv() {
            Ok(block) => return block,
            Err(TryRecvError::Disconnected) => return Bytes::new(),
            Err(TryRecvError::Empty) => {}
        }

        if self.shared.is_closed() {
            return Bytes::new();
        }

        tokio::select! {
            biased;
            // A block may have been sent right before the close; pick it up
            // rather than dropping it on the floor.
            () = self.shared.cancel.cancelled() => self.rx.try_recv().unwrap_or_default(),
            block = self.rx.recv() => block.unwrap_or_default(),
        }
    }

    /// Close the pipe. Idempotent; unblocks both halves.
    pub fn close(&self) {
        self.shared.close();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Consume the reader as a stream of blocks, ending at end-of-stream.
    pub fn into_stream(self) -> impl Stream<Item = Bytes> + Send {
        futures::stream::unfold(self, |mut reader| async move {
            let block = reader.read().await;
            if block.is_empty() {
                None
            } else {
                Some((block, reader))
            }
        })
    }
}
