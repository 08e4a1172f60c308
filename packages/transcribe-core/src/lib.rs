//! Transcribe Core - shared library for the real-time speech-to-text streaming gateway.
//!
//! This crate bridges a downstream WebSocket client (raw 16kHz/16-bit mono PCM in,
//! JSON transcript messages out) to the upstream Volcengine (Doubao) streaming ASR
//! service, with an optional LLM rewrite pass applied to in-flight transcripts.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`frame`]: Pure binary frame codec for the upstream ASR wire protocol
//! - [`asr`]: Upstream ASR client (connects, streams audio, yields transcript snapshots)
//! - [`correction`]: Optional LLM rewrite client for in-flight transcript smoothing
//! - [`session`]: Per-connection session pipeline tying the above together
//! - [`state`]: Core application configuration
//! - [`error`]: Centralized error types
//! - [`api`]: HTTP/WebSocket server surface
//!
#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod asr;
pub mod bootstrap;
pub mod correction;
pub mod error;
pub mod frame;
pub mod protocol_constants;
pub mod session;
pub mod state;
pub mod utils;

pub use asr::{stream_asr, AsrClientError};
pub use bootstrap::{bootstrap_services, BootstrappedServices};
pub use correction::rewrite;
pub use error::{ErrorCode, TranscribeError, TranscribeResult};
pub use frame::{DecodedFrame, CHUNK_BYTES, CHUNK_SAMPLES};
pub use session::{DownstreamMessage, Snapshot, TranscribeSession};
pub use state::{Config, VolcengineConfig};
pub use utils::{generate_connect_id, now_millis};

pub use api::{start_server, AppState, AppStateBuilder, ServerError, WsConnectionManager};
