//! Cooperative cancellation and progress reporting for decode runs
//!
//! Decoders poll a [`CancelToken`] on every loop iteration and publish progress
//! through a [`ProgressReporter`]. Progress travels over a crossbeam channel as
//! whole percentages and is only sent when the value increases, so a consumer
//! on another thread sees a coarse, monotonically non-decreasing sequence.

use crossbeam_channel::Sender;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tracing::trace;

/// Shared cancellation flag
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Decoders stop at their next poll and return what
    /// they have emitted so far.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Publishes decode progress as a percentage (0-100)
#[derive(Debug, Default)]
pub struct ProgressReporter {
    tx: Option<Sender<u8>>,
    last: AtomicU8,
}

impl ProgressReporter {
    /// Reporter that sends percentages to `tx`
    pub fn new(tx: Sender<u8>) -> Self {
        Self {
            tx: Some(tx),
            last: AtomicU8::new(0),
        }
    }

    /// Reporter that only tracks the last value
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Last published percentage
    pub fn last(&self) -> u8 {
        self.last.load(Ordering::Relaxed)
    }

    /// Publish `percent` if it is larger than the last published value.
    pub fn update(&self, percent: u8) {
        let percent = percent.min(100);
        if self.last.fetch_max(percent, Ordering::Relaxed) >= percent {
            return;
        }
        if let Some(tx) = &self.tx
            && tx.send(percent).is_err()
        {
            trace!("Progress receiver dropped at {}%", percent);
        }
    }
}

/// Maps a position inside `[start, end)` to an overall percentage.
///
/// A decode made of several stages (one per logic line) gives each stage an
/// equal share of the range so the overall value never goes backwards.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSpan {
    start: u64,
    end: u64,
    stage: u32,
    stages: u32,
}

impl ProgressSpan {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end,
            stage: 0,
            stages: 1,
        }
    }

    /// Place this span as stage `stage` of `stages`.
    pub fn stage(mut self, stage: u32, stages: u32) -> Self {
        self.stages = stages.max(1);
        self.stage = stage.min(self.stages - 1);
        self
    }

    pub fn percent(&self, current: u64) -> u8 {
        let span = self.end.saturating_sub(self.start).max(1);
        let done = current.saturating_sub(self.start).min(span);
        let in_stage = done * 100 / span;
        ((u64::from(self.stage) * 100 + in_stage) / u64::from(self.stages)) as u8
    }
}

/// Per-call decode environment: cancellation plus progress
#[derive(Debug, Default)]
pub struct DecodeContext {
    pub cancel: CancelToken,
    pub progress: ProgressReporter,
}

impl DecodeContext {
    pub fn new(cancel: CancelToken, progress: ProgressReporter) -> Self {
        Self { cancel, progress }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Report the position `current` within `span`
    pub fn report(&self, span: &ProgressSpan, current: u64) {
        self.progress.update(span.percent(current));
    }
}
