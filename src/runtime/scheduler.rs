//! Thread-per-decode scheduler
//!
//! Spawns a dedicated thread for each decode job so the caller stays responsive
//! while large captures are scanned.
//!
//! Each job holds a read lock on the shared capture for the duration of the
//! decode. Cursor edits take the write lock and therefore wait until no decode
//! is in flight over the same capture.
//!
//! All jobs started on one scheduler share a single [`CancelToken`]; `stop()`
//! cancels them cooperatively and `wait()` still returns their partial results.

use super::control::{CancelToken, DecodeContext, ProgressReporter};
use super::errors::{DecodeError, DecodeResult};
use super::node::ProtocolDecoder;
use crate::capture::Capture;
use crate::decoders::Decoded;
use crossbeam_channel::{Receiver as ProgressReceiver, unbounded};
use std::collections::HashMap;
use std::sync::mpsc::{Receiver as StdReceiver, Sender as StdSender, channel};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

type JobHandle = JoinHandle<DecodeResult<Decoded>>;

/// Runtime scheduler that executes decode jobs on worker threads
pub struct Scheduler {
    threads: Vec<(String, JobHandle)>,
    cancel: CancelToken,
    completion_tx: StdSender<String>,
    completion_rx: StdReceiver<String>,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new() -> Self {
        let (completion_tx, completion_rx) = channel();
        Self {
            threads: Vec::new(),
            cancel: CancelToken::new(),
            completion_tx,
            completion_rx,
        }
    }

    /// Start a decoder in its own thread.
    ///
    /// Returns the receiving end of the job's progress channel. Percentages are
    /// whole numbers and never decrease.
    pub fn start<D: ProtocolDecoder + 'static>(
        &mut self,
        name: impl Into<String>,
        decoder: D,
        capture: Arc<RwLock<Capture>>,
    ) -> ProgressReceiver<u8> {
        let name = name.into();
        let thread_name = name.clone();
        let completion_tx = self.completion_tx.clone();
        let (progress_tx, progress_rx) = unbounded();
        let ctx = DecodeContext::new(self.cancel.clone(), ProgressReporter::new(progress_tx));

        debug!("Starting decode job: {} ({})", name, decoder.name());

        let handle = thread::spawn(move || {
            let result = match capture.read() {
                Ok(guard) => decoder.decode(&guard, &ctx),
                Err(_) => Err(DecodeError::LockPoisoned),
            };

            match &result {
                Ok(decoded) => info!(
                    "[{}] Finished: {} events, {} symbols, {} errors{}",
                    thread_name,
                    decoded.events.len(),
                    decoded.stats.symbols,
                    decoded.stats.errors,
                    if decoded.stats.cancelled { " (cancelled)" } else { "" }
                ),
                Err(e) => error!("[{}] Decode failed: {}", thread_name, e),
            }

            // Notify scheduler that this thread is about to complete
            let _ = completion_tx.send(thread_name);
            result
        });

        self.threads.push((name, handle));
        progress_rx
    }

    /// Token shared by every job on this scheduler
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Signal all jobs to stop
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Get the number of started jobs
    pub fn num_jobs(&self) -> usize {
        self.threads.len()
    }

    /// Wait for all decode threads to complete.
    ///
    /// Threads are joined as their completion notifications arrive. Results are
    /// returned in the order the jobs were started.
    pub fn wait(self) -> Vec<(String, DecodeResult<Decoded>)> {
        let Scheduler {
            threads,
            completion_tx,
            completion_rx,
            ..
        } = self;

        // Drop the main completion sender so the channel closes when all threads complete
        drop(completion_tx);

        let total_threads = threads.len();
        let order: Vec<String> = threads.iter().map(|(name, _)| name.clone()).collect();
        let mut threads_by_name: HashMap<String, JobHandle> = threads.into_iter().collect();
        let mut results: HashMap<String, DecodeResult<Decoded>> = HashMap::new();

        info!("Waiting for {} decode jobs to complete...", total_threads);

        // A panicking job never sends its notification; the channel still closes
        // once its sender is dropped during unwinding.
        while let Ok(thread_name) = completion_rx.recv() {
            if let Some(handle) = threads_by_name.remove(&thread_name) {
                let result = Self::join(&thread_name, handle);
                info!(
                    "[{}] Job completed ({}/{})",
                    thread_name,
                    results.len() + 1,
                    total_threads
                );
                results.insert(thread_name, result);
            }
        }

        for (thread_name, handle) in threads_by_name {
            let result = Self::join(&thread_name, handle);
            results.insert(thread_name, result);
        }

        order
            .into_iter()
            .filter_map(|name| results.remove(&name).map(|result| (name, result)))
            .collect()
    }

    fn join(thread_name: &str, handle: JobHandle) -> DecodeResult<Decoded> {
        match handle.join() {
            Ok(result) => result,
            Err(e) => {
                error!("[{}] Thread panicked: {:?}", thread_name, e);
                Err(DecodeError::WorkerPanicked(thread_name.to_string()))
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
