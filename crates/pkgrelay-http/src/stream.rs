//! Bounded-window request bodies.
//!
//! [`BoundedChunks`] turns an `AsyncRead` into a stream of chunks no larger
//! than a fixed window. Only the window and the chunk currently being
//! written exist in memory at any time, regardless of asset size.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use pkgrelay_core::TransferProgress;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::watch;

/// Byte counters shared between a body stream and the code awaiting the
/// response.
#[derive(Debug)]
pub struct TransferMeter {
    sent: AtomicU64,
    peak: AtomicUsize,
    total: Option<u64>,
    progress: Option<watch::Sender<TransferProgress>>,
}

impl TransferMeter {
    /// Create a meter for a transfer of `total` bytes (if known).
    pub fn new(total: Option<u64>, progress: Option<watch::Sender<TransferProgress>>) -> Self {
        Self {
            sent: AtomicU64::new(0),
            peak: AtomicUsize::new(0),
            total,
            progress,
        }
    }

    /// Bytes handed to the request body so far.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Acquire)
    }

    /// Largest single chunk produced.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    fn record(&self, len: usize) {
        let sent = self.sent.fetch_add(len as u64, Ordering::AcqRel) + len as u64;
        self.peak.fetch_max(len, Ordering::AcqRel);
        if let Some(tx) = &self.progress {
            tx.send_replace(TransferProgress {
                sent,
                total: self.total,
            });
        }
    }
}

/// A `Stream` of chunks read from `R` through a fixed window.
///
/// The reader sits behind a mutex so the stream is `Sync` even when the
/// reader is not; only `poll_next` touches it, through `get_mut`, so the
/// lock is never contended. The reader is dropped as soon as it reports
/// EOF or an error, and otherwise when the stream itself is dropped.
pub struct BoundedChunks<R> {
    reader: Mutex<Option<R>>,
    window: Box<[u8]>,
    meter: Arc<TransferMeter>,
}

impl<R> BoundedChunks<R>
where
    R: AsyncRead + Unpin,
{
    /// Read `reader` in chunks of at most `window` bytes.
    pub fn new(reader: R, window: usize, meter: Arc<TransferMeter>) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
            window: vec![0u8; window.max(1)].into_boxed_slice(),
            meter,
        }
    }
}

impl<R> Stream for BoundedChunks<R>
where
    R: AsyncRead + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let slot = this.reader.get_mut().unwrap_or_else(PoisonError::into_inner);
        let Some(reader) = slot.as_mut() else {
            return Poll::Ready(None);
        };

        let mut buf = ReadBuf::new(&mut this.window);
        let polled = Pin::new(reader).poll_read(cx, &mut buf);

        match polled {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => {
                *slot = None;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(Ok(())) => {
                let filled = buf.filled();
                if filled.is_empty() {
                    *slot = None;
                    return Poll::Ready(None);
                }
                this.meter.record(filled.len());
                Poll::Ready(Some(Ok(Bytes::copy_from_slice(filled))))
            }
        }
    }
}
