//! Upstream Volcengine streaming ASR client.
//!
//! Connects to the streaming endpoint, paces outbound PCM as length-prefixed binary
//! frames, and yields a deduplicated sequence of full-transcript snapshots until the
//! upstream terminal flag is observed or the connection closes.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use thiserror::Error;
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::http::Request;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::TranscribeError;
use crate::frame::{self, DecodedFrame, CHUNK_BYTES, HEADER_AUDIO_LAST, HEADER_AUDIO_ONLY, HEADER_FULL_CLIENT};
use crate::protocol_constants::{ASR_PACING_DELAY_MS, VOLCENGINE_STREAM_URL};
use crate::state::VolcengineConfig;
use crate::utils::generate_connect_id;

/// Errors raised by the upstream ASR client.
#[derive(Debug, Error, Clone)]
pub enum AsrClientError {
    /// Upstream credentials are not configured.
    #[error("volcengine credentials not configured")]
    ConfigMissing,
    /// Upstream sent a `0x0F` protocol error frame.
    #[error("upstream protocol error: code={0}")]
    UpstreamProtocolError(u32),
    /// Any transport-level failure on the upstream connection.
    #[error("upstream transport error: {0}")]
    Transport(String),
}

impl From<AsrClientError> for TranscribeError {
    fn from(err: AsrClientError) -> Self {
        match err {
            AsrClientError::ConfigMissing => {
                TranscribeError::ConfigMissing("volcengine credentials not configured".into())
            }
            AsrClientError::UpstreamProtocolError(code) => {
                TranscribeError::UpstreamProtocolError(code)
            }
            AsrClientError::Transport(msg) => TranscribeError::TransportError(msg),
        }
    }
}

fn build_request(config: &VolcengineConfig) -> Result<Request<()>, AsrClientError> {
    Request::builder()
        .uri(VOLCENGINE_STREAM_URL)
        .header("Host", "openspeech.bytedance.com")
        .header("Upgrade", "websocket")
        .header("Connection", "Upgrade")
        .header("Sec-WebSocket-Key", generate_key())
        .header("Sec-WebSocket-Version", "13")
        .header("X-Api-App-Key", &config.app_key)
        .header("X-Api-Access-Key", &config.access_key)
        .header("X-Api-Resource-Id", &config.resource_id)
        .header("X-Api-Connect-Id", generate_connect_id())
        .body(())
        .map_err(|e| AsrClientError::Transport(e.to_string()))
}

fn full_client_request_body(effect: bool) -> Vec<u8> {
    let body = serde_json::json!({
        "audio": {"format": "pcm", "codec": "raw", "rate": 16000, "bits": 16, "channel": 1},
        "request": {
            "model_name": "bigmodel",
            "enable_itn": true,
            "enable_punc": true,
            "enable_ddc": effect,
        },
    });
    serde_json::to_vec(&body).expect("FULL_CLIENT_REQUEST body is always valid JSON")
}

/// Guard that notifies `send_done` on every exit path of the sender task, including panics.
struct SendDoneGuard(Arc<Notify>);

impl Drop for SendDoneGuard {
    fn drop(&mut self) {
        self.0.notify_one();
    }
}

async fn send_audio_task<W, A>(mut write: W, mut audio: A, send_done: Arc<Notify>)
where
    W: futures::Sink<WsMessage> + Unpin,
    A: Stream<Item = Bytes> + Unpin,
{
    let _guard = SendDoneGuard(send_done);
    let mut buf = BytesMut::new();

    while let Some(chunk) = audio.next().await {
        buf.extend_from_slice(&chunk);
        while buf.len() >= CHUNK_BYTES {
            let piece = buf.split_to(CHUNK_BYTES);
            let frame = frame::encode(HEADER_AUDIO_ONLY, &piece);
            if write.send(WsMessage::Binary(frame.into())).await.is_err() {
                log::warn!("[ASR] audio send failed, stopping sender");
                return;
            }
            tokio::time::sleep(Duration::from_millis(ASR_PACING_DELAY_MS)).await;
        }
    }

    let residual = buf.split_to(buf.len());
    let frame = frame::encode(HEADER_AUDIO_LAST, &residual);
    if let Err(e) = write.send(WsMessage::Binary(frame.into())).await {
        log::warn!("[ASR] final AUDIO_LAST send failed: {e}");
    }
}

/// Opens an upstream ASR session and returns a deduplicated sequence of transcript
/// snapshots. Terminates when the upstream terminal flag is observed, on protocol
/// error, or when the connection closes.
pub fn stream_asr(
    config: VolcengineConfig,
    effect: bool,
    audio: impl Stream<Item = Bytes> + Send + Unpin + 'static,
) -> impl Stream<Item = Result<String, AsrClientError>> {
    async_stream::try_stream! {
        if !config.asr_valid() {
            Err(AsrClientError::ConfigMissing)?;
        }

        let request = build_request(&config)?;
        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| AsrClientError::Transport(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let open_frame = frame::encode(HEADER_FULL_CLIENT, &full_client_request_body(effect));
        write
            .send(WsMessage::Binary(open_frame.into()))
            .await
            .map_err(|e| AsrClientError::Transport(e.to_string()))?;

        let send_done = Arc::new(Notify::new());
        let send_handle = tokio::spawn(send_audio_task(write, audio, send_done.clone()));

        let mut last_text: Option<String> = None;

        loop {
            match read.next().await {
                Some(Ok(WsMessage::Binary(data))) => match frame::decode_server_frame(&data) {
                    DecodedFrame::Error { code } => {
                        Err(AsrClientError::UpstreamProtocolError(code))?;
                    }
                    DecodedFrame::Result { text, terminal } => {
                        if let Some(text) = text {
                            if last_text.as_deref() != Some(text.as_str()) {
                                last_text = Some(text.clone());
                                yield text;
                            }
                        }
                        if terminal {
                            break;
                        }
                    }
                    DecodedFrame::Ignored => {}
                },
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    Err(AsrClientError::Transport(e.to_string()))?;
                }
            }
        }

        send_done.notified().await;
        send_handle.abort();
    }
}
