//! ✂️ The BatchWorker: cuts an endless stream of events into windows.
//!
//! One `select!` loop, two ways out of a window: the timer started by the
//! window's first record, or the size limit. The timer branch is polled first,
//! so a record that shows up after the deadline goes into the next window, not
//! the one that just expired. When the intake is closed and empty, the final
//! partial window is sent and the batch channel is closed behind it.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_channel::{Receiver, Sender};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace};

use super::{BufferCounters, Worker};
use crate::common::{EventBatch, EventRecord};

#[derive(Debug)]
pub(crate) struct BatchWorker {
    intake: Receiver<EventRecord>,
    batches: Sender<EventBatch>,
    flush_interval: Duration,
    max_batch_len: usize,
    counters: Arc<BufferCounters>,
}

impl BatchWorker {
    pub(crate) fn new(
        intake: Receiver<EventRecord>,
        batches: Sender<EventBatch>,
        flush_interval: Duration,
        max_batch_len: usize,
        counters: Arc<BufferCounters>,
    ) -> Self {
        Self {
            intake,
            batches,
            flush_interval,
            max_batch_len,
            counters,
        }
    }

    /// 📤 Hand the window to the index worker, if there is anything in it.
    fn emit(&self, window: &mut Vec<EventRecord>) -> Result<()> {
        if window.is_empty() {
            return Ok(());
        }
        let batch = EventBatch::new(std::mem::take(window));
        trace!("📤 BatchWorker closing a window of {} events", batch.len());
        self.batches
            .try_send(batch)
            .map_err(|_| anyhow!("💀 the index worker is gone; a batch had nowhere to go"))?;
        self.counters.batches.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl Worker for BatchWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("✂️ BatchWorker started windowing the intake...");
            let mut window: Vec<EventRecord> = Vec::with_capacity(self.max_batch_len);
            // -- None while the window is empty: no records, no clock
            let mut deadline: Option<Instant> = None;
            loop {
                tokio::select! {
                    biased;

                    _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                        self.emit(&mut window)?;
                        deadline = None;
                    }

                    received = self.intake.recv() => match received {
                        Ok(record) => {
                            if window.is_empty() {
                                deadline = Some(Instant::now() + self.flush_interval);
                            }
                            window.push(record);
                            if window.len() >= self.max_batch_len {
                                self.emit(&mut window)?;
                                deadline = None;
                            }
                        }
                        Err(_) => {
                            // Channel is empty and closed
                            self.emit(&mut window)?;
                            self.batches.close();
                            debug!("🏁 BatchWorker: intake closed and drained. Shutting down.");
                            return Ok(());
                        }
                    },
                }
            }
        })
    }
}
