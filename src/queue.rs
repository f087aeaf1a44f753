//! Bounded in-memory queue between capture and the store.

use crate::store::ErrorRow;
use std::collections::VecDeque;

/// A queued row plus how many flushes have already failed with it aboard.
#[derive(Debug, Clone)]
pub(crate) struct QueuedRecord {
    pub row: ErrorRow,
    pub attempts: u32,
}

/// FIFO queue with a hard bound and a per-record retry budget. Oldest-first
/// everywhere: batches leave from the front, failed batches go back to the
/// front, overflow drops the front.
#[derive(Debug)]
pub(crate) struct ErrorQueue {
    items: VecDeque<QueuedRecord>,
    max_queue: usize,
    max_retries: u32,
}

impl ErrorQueue {
    pub fn new(max_queue: usize, max_retries: u32) -> Self {
        Self {
            items: VecDeque::new(),
            max_queue,
            max_retries,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a fresh row. If the queue is full the oldest record is dropped
    /// and returned so the caller can log it.
    pub fn push(&mut self, row: ErrorRow) -> Option<ErrorRow> {
        let dropped = if self.items.len() >= self.max_queue {
            self.items.pop_front().map(|q| q.row)
        } else {
            None
        };
        self.items.push_back(QueuedRecord { row, attempts: 0 });
        dropped
    }

    /// Take up to `batch_size` records from the front.
    pub fn take_batch(&mut self, batch_size: usize) -> Vec<QueuedRecord> {
        let n = batch_size.min(self.items.len());
        self.items.drain(..n).collect()
    }

    /// Put a failed batch back at the front in its original order, counting
    /// the failed attempt. Records over the retry budget are dropped;
    /// returns how many.
    pub fn requeue(&mut self, batch: Vec<QueuedRecord>) -> usize {
        let mut dropped = 0;
        for mut record in batch.into_iter().rev() {
            record.attempts += 1;
            if record.attempts > self.max_retries {
                dropped += 1;
                continue;
            }
            self.items.push_front(record);
        }
        dropped
    }
}
