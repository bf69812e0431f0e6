//! Speech playback worker.
//!
//! Utterances are voiced on a separate task so the engine loop stays
//! responsive. Each job carries a completion signal; the engine stays
//! paused until it fires.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Playback failure. The job still completes.
#[derive(Debug, Error)]
#[error("speech playback failed: {0}")]
pub struct SpeechError(pub String);

/// Something that can voice text.
#[async_trait]
pub trait SpeechSink: Send + Sync {
    /// Voice `text`, returning when playback is over.
    async fn speak(&self, text: &str, voice: Option<&str>) -> Result<(), SpeechError>;
}

struct SpeechJob {
    text: String,
    voice: Option<String>,
    done: oneshot::Sender<()>,
}

/// Sending side of the speech worker.
#[derive(Clone, Debug)]
pub struct SpeechHandle {
    tx: mpsc::UnboundedSender<SpeechJob>,
}

impl SpeechHandle {
    /// Queue `text` for playback.
    ///
    /// The receiver resolves once playback ends, or immediately with an
    /// error if the worker is gone.
    pub fn say(&self, text: impl Into<String>, voice: Option<&str>) -> oneshot::Receiver<()> {
        let (done, rx) = oneshot::channel();
        let job = SpeechJob {
            text: text.into(),
            voice: voice.map(str::to_string),
            done,
        };
        if self.tx.send(job).is_err() {
            warn!("speech worker stopped, dropping utterance");
        }
        rx
    }
}

impl std::fmt::Debug for SpeechJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechJob")
            .field("chars", &self.text.len())
            .field("voice", &self.voice)
            .finish_non_exhaustive()
    }
}

/// Background task draining speech jobs one at a time.
pub struct SpeechWorker;

impl SpeechWorker {
    /// Spawn the worker on the current runtime.
    pub fn spawn(
        sink: Arc<dyn SpeechSink>,
        cancel: CancellationToken,
    ) -> (SpeechHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(sink, rx, cancel));
        (SpeechHandle { tx }, task)
    }
}

#[instrument(skip_all)]
async fn run(
    sink: Arc<dyn SpeechSink>,
    mut rx: mpsc::UnboundedReceiver<SpeechJob>,
    cancel: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            () = cancel.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };
        debug!(?job, "speaking");
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = job.done.send(());
                break;
            }
            result = sink.speak(&job.text, job.voice.as_deref()) => {
                if let Err(e) = result {
                    warn!(error = %e, "speech playback failed");
                }
            }
        }
        let _ = job.done.send(());
    }
    debug!("speech worker stopped");
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
