//! One scan attempt: entries, then a cursor, then a terminal status.
use std::sync::mpsc::{self, Receiver, SyncSender};

use tracing::trace;

use super::TimeEntry;
use crate::error::EngineError;

/// Consumer side of a scan.
///
/// Iterate it for the entries (in engine order), then call
/// [`finish`](EntryStream::finish) for the cursor and the terminal status. The
/// stream is finite and cannot be restarted. Dropping it early disconnects the
/// producer, which stops at its next send.
pub struct EntryStream {
    series: String,
    entries: Receiver<TimeEntry>,
    next: Receiver<Option<i64>>,
    status: Receiver<Result<(), EngineError>>,
}

/// Producer side of a scan, owned by the engine.
pub struct ScanProducer {
    entries: SyncSender<TimeEntry>,
    next: SyncSender<Option<i64>>,
    status: SyncSender<Result<(), EngineError>>,
}

impl EntryStream {
    /// Creates a connected producer/stream pair. At most `capacity` entries are
    /// buffered between them.
    pub fn channel(series: &str, capacity: usize) -> (ScanProducer, EntryStream) {
        let (entries_tx, entries_rx) = mpsc::sync_channel(capacity);
        // Each signal is sent once and must never block the producer.
        let (next_tx, next_rx) = mpsc::sync_channel(1);
        let (status_tx, status_rx) = mpsc::sync_channel(1);
        (
            ScanProducer {
                entries: entries_tx,
                next: next_tx,
                status: status_tx,
            },
            EntryStream {
                series: series.to_string(),
                entries: entries_rx,
                next: next_rx,
                status: status_rx,
            },
        )
    }

    /// A stream that yields nothing and reports `error`.
    pub fn failed(series: &str, error: EngineError) -> EntryStream {
        let (producer, stream) = Self::channel(series, 1);
        producer.complete(None, Err(error));
        stream
    }

    pub fn series(&self) -> &str {
        &self.series
    }

    /// Drains any unread entries, then waits for the cursor and the terminal
    /// status of the scan.
    pub fn finish(self) -> Result<Option<i64>, EngineError> {
        let unread = self.entries.iter().count();
        if unread > 0 {
            trace!(series = %self.series, unread, "Discarded unread scan entries");
        }
        let next = self.next.recv().unwrap_or(None);
        match self.status.recv() {
            Ok(status) => status.map(|()| next),
            Err(_) => Err(EngineError::ProducerLost(self.series)),
        }
    }
}

impl Iterator for EntryStream {
    type Item = TimeEntry;

    fn next(&mut self) -> Option<TimeEntry> {
        self.entries.recv().ok()
    }
}

impl ScanProducer {
    /// Sends one entry. Returns `false` once the consumer has gone away.
    pub fn send(&self, entry: TimeEntry) -> bool {
        self.entries.send(entry).is_ok()
    }

    /// Reports the cursor and terminal status, closing the stream.
    pub fn complete(self, next: Option<i64>, status: Result<(), EngineError>) {
        // A consumer that has already gone away has nothing left to tell.
        let _ = self.next.send(next);
        let _ = self.status.send(status);
    }
}
