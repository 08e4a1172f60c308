//! Per-connection session pipeline.
//!
//! Three cooperating tasks share one [`SharedAsrState`] behind a single mutex (mandatory
//! on Tokio's preemptive, work-stealing scheduler — see the crate-level design notes):
//! an ASR consumer draining the upstream snapshot sequence, a throttled correction
//! driver that is the only task allowed to emit downstream messages, and an idle
//! watcher that reaps sessions whose ASR has gone quiet.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::Stream;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::asr::{self, AsrClientError};
use crate::correction;
use crate::protocol_constants::{CHECK_INTERVAL_CAP_SEC, CORRECTION_WINDOW_SEC, CORR_WAIT_TIMEOUT_SEC};
use crate::state::VolcengineConfig;

/// A rewrite step: `(snapshot, history) -> rewritten text`, never failing (the real
/// implementation degrades to the raw snapshot internally; see [`correction::rewrite`]).
/// Boxed so the correction driver can be exercised against a stub in tests without
/// a live Ark credential/connection.
type RewriteFn = Arc<dyn Fn(String, String) -> BoxFuture<'static, String> + Send + Sync>;

fn live_rewrite_fn(volcengine: VolcengineConfig) -> RewriteFn {
    Arc::new(move |snap, history| {
        let volcengine = volcengine.clone();
        Box::pin(async move { correction::rewrite(&volcengine, &snap, &history).await })
    })
}

/// A full-transcript snapshot as produced by the upstream ASR. Callers replace their
/// display with this value; snapshots are never concatenated.
pub type Snapshot = String;

/// A downstream JSON message, as sent over the WebSocket text channel.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DownstreamMessage {
    /// An incremental or terminal transcript snapshot.
    Transcript {
        text: String,
        is_final: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// The administrative message sent only when idle timeout ends a session.
    Closed { closed: bool, reason: &'static str },
}

/// The trio of fields that must be synchronized across the session's three tasks.
struct SharedAsrState {
    current_asr: String,
    last_asr_update_at: Instant,
    asr_done: bool,
    /// Set only for errors that must be surfaced to the client (`ConfigMissing`,
    /// `UpstreamProtocolError`); transport errors degrade silently instead.
    error: Option<String>,
}

impl SharedAsrState {
    fn new() -> Self {
        Self {
            current_asr: String::new(),
            last_asr_update_at: Instant::now(),
            asr_done: false,
            error: None,
        }
    }
}

/// Per-client transcription session: ties the upstream ASR client, the optional LLM
/// rewrite pass, and the downstream WebSocket adapter together.
pub struct TranscribeSession {
    volcengine: VolcengineConfig,
    effect: bool,
    use_llm: bool,
    idle_timeout_sec: f64,
}

impl TranscribeSession {
    /// Builds a session. `idle_timeout_sec` is expected to already be clamped to
    /// `[IDLE_TIMEOUT_MIN, IDLE_TIMEOUT_MAX]` by the caller.
    #[must_use]
    pub fn new(volcengine: VolcengineConfig, effect: bool, use_llm: bool, idle_timeout_sec: f64) -> Self {
        Self {
            volcengine,
            effect,
            use_llm,
            idle_timeout_sec,
        }
    }

    /// Runs the session to completion: drains `audio` into the upstream ASR client,
    /// emits downstream messages on `downstream_tx`, and returns once the session ends
    /// (idle timeout) or `cancel` fires (client disconnect / force close).
    pub async fn run(
        self,
        audio: impl Stream<Item = Bytes> + Send + Unpin + 'static,
        downstream_tx: mpsc::UnboundedSender<DownstreamMessage>,
        cancel: CancellationToken,
    ) {
        let use_correction = self.use_llm && self.volcengine.ark_valid();
        let asr_stream = Box::pin(asr::stream_asr(self.volcengine.clone(), self.effect, audio));
        let rewrite_fn = live_rewrite_fn(self.volcengine);

        run_pipeline(
            asr_stream,
            use_correction,
            rewrite_fn,
            self.idle_timeout_sec,
            downstream_tx,
            cancel,
        )
        .await;
    }
}

/// Drives the three-task session pipeline over an already-constructed snapshot stream
/// and rewrite step. Factored out of [`TranscribeSession::run`] so the seed scenarios
/// in `#[cfg(test)]` can exercise the full pipeline against stub ASR/rewrite
/// implementations instead of a live Volcengine/Ark connection.
async fn run_pipeline(
    asr_stream: impl Stream<Item = Result<Snapshot, AsrClientError>> + Send + Unpin + 'static,
    use_correction: bool,
    rewrite_fn: RewriteFn,
    idle_timeout_sec: f64,
    downstream_tx: mpsc::UnboundedSender<DownstreamMessage>,
    cancel: CancellationToken,
) {
    let shared = Arc::new(Mutex::new(SharedAsrState::new()));
    let idle_requested = CancellationToken::new();
    let final_sent = Arc::new(AtomicBool::new(false));

    let asr_handle = tokio::spawn(asr_consumer_task(asr_stream, shared.clone()));
    let asr_abort = asr_handle.abort_handle();

    let corr_handle = tokio::spawn(correction_driver_task(
        shared.clone(),
        idle_requested.clone(),
        use_correction,
        rewrite_fn,
        downstream_tx.clone(),
        final_sent,
    ));
    let corr_abort = corr_handle.abort_handle();

    let idle_handle = tokio::spawn(idle_watcher_task(
        shared,
        idle_requested,
        idle_timeout_sec,
        asr_abort.clone(),
        corr_handle,
        corr_abort.clone(),
        downstream_tx,
    ));
    let idle_abort = idle_handle.abort_handle();

    // Hard-cancellation path: client disconnected or the connection was force-closed.
    // Per the termination matrix this aborts all three siblings without draining them.
    let watchdog = tokio::spawn(async move {
        cancel.cancelled().await;
        asr_abort.abort();
        corr_abort.abort();
        idle_abort.abort();
    });

    let _ = asr_handle.await;
    let _ = idle_handle.await;
    watchdog.abort();
}

async fn asr_consumer_task(
    mut asr_stream: impl Stream<Item = Result<Snapshot, AsrClientError>> + Unpin,
    shared: Arc<Mutex<SharedAsrState>>,
) {
    use futures::StreamExt;

    loop {
        match asr_stream.next().await {
            Some(Ok(text)) => {
                let mut state = shared.lock();
                state.current_asr = text;
                state.last_asr_update_at = Instant::now();
            }
            Some(Err(e)) => {
                match &e {
                    AsrClientError::Transport(_) => {
                        log::debug!("[Transcribe] upstream transport closed: {e}");
                    }
                    AsrClientError::ConfigMissing | AsrClientError::UpstreamProtocolError(_) => {
                        log::warn!("[Transcribe] upstream error: {e}");
                        shared.lock().error = Some(e.to_string());
                    }
                }
                break;
            }
            None => break,
        }
    }
    shared.lock().asr_done = true;
}

fn try_send_final(
    final_sent: &AtomicBool,
    downstream_tx: &mpsc::UnboundedSender<DownstreamMessage>,
    text: String,
    error: Option<String>,
) {
    if final_sent
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
    {
        let _ = downstream_tx.send(DownstreamMessage::Transcript {
            text,
            is_final: true,
            error,
        });
    }
}

fn last_three_joined(history: &[String]) -> String {
    let start = history.len().saturating_sub(3);
    history[start..].join("\n")
}

/// Computes the text to emit for `snap` (rewriting it if correction is in effect),
/// appends it to `stable_history` if the ASR sequence is done at completion time, emits
/// the non-final downstream message, and returns the emitted text.
async fn compute_and_emit(
    snap: &str,
    use_correction: bool,
    rewrite_fn: &RewriteFn,
    stable_history: &mut Vec<String>,
    downstream_tx: &mpsc::UnboundedSender<DownstreamMessage>,
    shared: &Arc<Mutex<SharedAsrState>>,
) -> String {
    let text = if use_correction {
        let history = last_three_joined(stable_history);
        rewrite_fn(snap.to_string(), history).await
    } else {
        snap.to_string()
    };

    if use_correction && shared.lock().asr_done {
        stable_history.push(text.clone());
    }

    let _ = downstream_tx.send(DownstreamMessage::Transcript {
        text: text.clone(),
        is_final: false,
        error: None,
    });

    text
}

async fn correction_driver_task(
    shared: Arc<Mutex<SharedAsrState>>,
    idle_requested: CancellationToken,
    use_correction: bool,
    rewrite_fn: RewriteFn,
    downstream_tx: mpsc::UnboundedSender<DownstreamMessage>,
    final_sent: Arc<AtomicBool>,
) {
    let mut last_sent_snap = String::new();
    let mut last_sent_text = String::new();
    let mut stable_history: Vec<String> = Vec::new();

    loop {
        if !idle_requested.is_cancelled() {
            tokio::select! {
                () = idle_requested.cancelled() => {}
                () = tokio::time::sleep(Duration::from_secs_f64(CORRECTION_WINDOW_SEC)) => {}
            }
        }

        let (snap, asr_done, error) = {
            let state = shared.lock();
            (state.current_asr.clone(), state.asr_done, state.error.clone())
        };

        if let Some(err_msg) = error {
            try_send_final(&final_sent, &downstream_tx, String::new(), Some(err_msg));
            return;
        }

        let closing = asr_done || idle_requested.is_cancelled();

        if snap.is_empty() || snap == last_sent_snap {
            if closing && !snap.is_empty() && use_correction {
                let text =
                    compute_and_emit(&snap, use_correction, &rewrite_fn, &mut stable_history, &downstream_tx, &shared)
                        .await;
                last_sent_snap = snap;
                last_sent_text = text;
            }
            if closing {
                break;
            }
            continue;
        }

        let text = compute_and_emit(&snap, use_correction, &rewrite_fn, &mut stable_history, &downstream_tx, &shared)
            .await;
        last_sent_snap = snap;
        last_sent_text = text;

        let closing_after = shared.lock().asr_done || idle_requested.is_cancelled();
        if closing_after {
            break;
        }
    }

    try_send_final(&final_sent, &downstream_tx, last_sent_text, None);
}

async fn idle_watcher_task(
    shared: Arc<Mutex<SharedAsrState>>,
    idle_requested: CancellationToken,
    idle_timeout_sec: f64,
    asr_abort: AbortHandle,
    corr_handle: tokio::task::JoinHandle<()>,
    corr_abort: AbortHandle,
    downstream_tx: mpsc::UnboundedSender<DownstreamMessage>,
) {
    let check_interval = Duration::from_secs_f64(idle_timeout_sec.min(CHECK_INTERVAL_CAP_SEC));

    loop {
        tokio::time::sleep(check_interval).await;

        let elapsed = shared.lock().last_asr_update_at.elapsed().as_secs_f64();
        if elapsed < idle_timeout_sec {
            continue;
        }

        idle_requested.cancel();

        let flush = tokio::time::timeout(Duration::from_secs_f64(CORR_WAIT_TIMEOUT_SEC), corr_handle);
        if flush.await.is_err() {
            corr_abort.abort();
        }

        let _ = downstream_tx.send(DownstreamMessage::Closed {
            closed: true,
            reason: "idle_timeout",
        });

        asr_abort.abort();
        return;
    }
}
