//! `/transcribe/stream` session entrypoint and downstream WebSocket adapter.
//!
//! Parses the upgrade request's query parameters, wires a per-connection
//! [`TranscribeSession`] to the downstream socket, and drains it to completion.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::AppState;
use crate::protocol_constants::{IDLE_TIMEOUT_MAX, IDLE_TIMEOUT_MIN};
use crate::session::{DownstreamMessage, TranscribeSession};

/// Query parameters accepted by `GET /transcribe/stream`.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    effect: bool,
    #[serde(default)]
    use_llm: bool,
    idle_timeout_sec: Option<u64>,
}

fn clamp_idle_timeout(requested: Option<u64>, default_sec: f64) -> f64 {
    match requested {
        Some(sec) => sec.clamp(IDLE_TIMEOUT_MIN, IDLE_TIMEOUT_MAX) as f64,
        None => default_sec,
    }
}

/// Upgrade handler for the gateway's single WebSocket route.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state, query))
}

async fn handle_ws(socket: WebSocket, state: AppState, query: StreamQuery) {
    let guard = state.ws_manager.register();
    log::info!("[Transcribe] connection {} opened", guard.id());

    let (volcengine, default_idle) = {
        let config = state.config.read();
        (config.volcengine.clone(), config.transcribe_ws_idle_timeout_sec)
    };
    let idle_timeout_sec = clamp_idle_timeout(query.idle_timeout_sec, default_idle);

    let (ws_tx, ws_rx) = socket.split();
    let disconnect = guard.cancel_token().clone();
    let audio = recv_pcm(ws_rx, disconnect.clone());

    let (downstream_tx, downstream_rx) = mpsc::unbounded_channel::<DownstreamMessage>();
    let sender = tokio::spawn(send_downstream(ws_tx, downstream_rx));

    let session = TranscribeSession::new(volcengine, query.effect, query.use_llm, idle_timeout_sec);
    session.run(audio, downstream_tx, disconnect).await;

    let _ = sender.await;
    log::info!("[Transcribe] connection {} closed", guard.id());
}

/// Reads client PCM as a lazy byte-chunk sequence. Terminates cleanly (no error
/// propagation) on a graceful close or end of stream; a genuine transport error also
/// cancels `disconnect`, triggering the hard-cancellation path for the session's three
/// tasks rather than letting them wind down through a normal `AUDIO_LAST` flush.
fn recv_pcm(
    mut ws_rx: SplitStream<WebSocket>,
    disconnect: CancellationToken,
) -> impl Stream<Item = Bytes> + Send + Unpin + 'static {
    Box::pin(async_stream::stream! {
        loop {
            match ws_rx.next().await {
                Some(Ok(Message::Binary(data))) => yield Bytes::from(data),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::debug!("[Transcribe] downstream transport error: {e}");
                    disconnect.cancel();
                    break;
                }
            }
        }
    })
}

/// Drains downstream messages onto the WebSocket send half until the channel closes
/// (i.e. the session pipeline has finished). Send failures are swallowed: the pipeline
/// may emit its trailing `is_final` message after the client is already gone.
async fn send_downstream(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut downstream_rx: mpsc::UnboundedReceiver<DownstreamMessage>,
) {
    while let Some(message) = downstream_rx.recv().await {
        let Ok(payload) = serde_json::to_string(&message) else {
            continue;
        };
        if let Err(e) = ws_tx.send(Message::Text(payload.into())).await {
            log::debug!("[Transcribe] downstream send failed, client likely gone: {e}");
        }
    }
    let _ = ws_tx.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_idle_timeout_uses_default_when_absent() {
        assert_eq!(clamp_idle_timeout(None, 7.5), 7.5);
    }

    #[test]
    fn clamp_idle_timeout_clamps_to_bounds() {
        assert_eq!(clamp_idle_timeout(Some(0), 5.0), IDLE_TIMEOUT_MIN as f64);
        assert_eq!(clamp_idle_timeout(Some(10_000), 5.0), IDLE_TIMEOUT_MAX as f64);
        assert_eq!(clamp_idle_timeout(Some(30), 5.0), 30.0);
    }
}
