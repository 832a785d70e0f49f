use super::CaptureRecord;
use super::assemble::{Assembler, CaptureStats};
use harcap_common::har::HarLog;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Create the fan-in point of a capture: the producer side, the one-shot
/// completion signal and the single consumer.
pub fn capture_channel() -> (Intake, CompletionSignal, CaptureAggregator) {
    let (tx, rx) = mpsc::unbounded_channel();
    let completion = CompletionSignal::new();
    let tracker = TaskTracker::new();
    let intake = Intake {
        tx,
        completion: completion.clone(),
        tracker: tracker.clone(),
    };
    let aggregator = CaptureAggregator {
        rx,
        completion: completion.clone(),
        tracker,
    };
    (intake, completion, aggregator)
}

/// One-shot "no further records will arrive" signal.
#[derive(Debug, Clone, Default)]
pub struct CompletionSignal {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Returns `true` only for the call that fired it;
    /// later calls are no-ops.
    pub fn complete(&self) -> bool {
        let first = !self.fired.swap(true, Ordering::SeqCst);
        self.token.cancel();
        first
    }

    pub fn is_complete(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn completed(&self) {
        self.token.cancelled().await
    }
}

/// Producer side of the capture. Each submitted job runs in its own task and
/// sends exactly one record.
#[derive(Clone)]
pub struct Intake {
    tx: mpsc::UnboundedSender<CaptureRecord>,
    completion: CompletionSignal,
    tracker: TaskTracker,
}

impl Intake {
    /// Spawn a producer for `job`. Returns `false` and drops the job when the
    /// capture has already completed.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() -> CaptureRecord + Send + 'static,
    {
        if self.completion.is_complete() {
            return false;
        }
        let tx = self.tx.clone();
        self.tracker.spawn(async move {
            if tx.send(job()).is_err() {
                // Aggregator is gone (deadline elapsed); the record is lost.
                tracing::debug!("Capture intake closed, dropping record");
            }
        });
        true
    }
}

/// Single consumer of the intake.
pub struct CaptureAggregator {
    rx: mpsc::UnboundedReceiver<CaptureRecord>,
    completion: CompletionSignal,
    tracker: TaskTracker,
}

impl CaptureAggregator {
    /// Receive records into `log` until completion, then collect everything
    /// sent by producers that were spawned before completion.
    ///
    /// The future is cancel safe in the sense that dropping it leaves `log`
    /// holding every record applied so far.
    pub async fn drain_into(mut self, log: &mut HarLog) -> CaptureStats {
        let mut assembler = Assembler::default();
        loop {
            tokio::select! {
                biased;
                Some(record) = self.rx.recv() => assembler.apply(log, record),
                _ = self.completion.completed() => break,
            }
        }

        self.tracker.close();
        self.tracker.wait().await;
        while let Ok(record) = self.rx.try_recv() {
            assembler.apply(log, record);
        }

        let stats = assembler.finish();
        tracing::info!(
            "Capture drained: {} page(s), {} entr(ies), {} response(s) merged, {} discarded",
            stats.pages,
            stats.entries,
            stats.responses_merged,
            stats.responses_discarded
        );
        stats
    }
}
