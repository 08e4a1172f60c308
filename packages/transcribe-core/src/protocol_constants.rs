//! Fixed protocol and pipeline constants that should NOT be changed.
//!
//! These values are defined by the upstream ASR vendor's API contract or by the
//! session pipeline's timing design; changing them changes observable behavior.

// ─────────────────────────────────────────────────────────────────────────────
// Application Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Service identifier used for discovery (health endpoint).
pub const SERVICE_ID: &str = "transcribe-gateway";

// ─────────────────────────────────────────────────────────────────────────────
// Session Pipeline Cadence
// ─────────────────────────────────────────────────────────────────────────────

/// Throttled correction-driver cadence, in seconds.
pub const CORRECTION_WINDOW_SEC: f64 = 1.8;

/// Upper bound on the idle watcher's sleep interval, in seconds.
/// The watcher actually sleeps `min(CHECK_INTERVAL_CAP_SEC, idle_timeout_sec)`.
pub const CHECK_INTERVAL_CAP_SEC: f64 = 5.0;

/// Maximum time the idle watcher waits for the correction driver's final flush
/// before cancelling it outright, in seconds.
pub const CORR_WAIT_TIMEOUT_SEC: f64 = 60.0;

/// Minimum accepted value for a client-supplied `idle_timeout_sec`, in seconds.
pub const IDLE_TIMEOUT_MIN: u64 = 1;

/// Maximum accepted value for a client-supplied `idle_timeout_sec`, in seconds.
pub const IDLE_TIMEOUT_MAX: u64 = 600;

// ─────────────────────────────────────────────────────────────────────────────
// Upstream ASR Wire Protocol
// ─────────────────────────────────────────────────────────────────────────────

/// Minimum pacing delay between non-terminal audio chunk sends, in milliseconds.
pub const ASR_PACING_DELAY_MS: u64 = 50;

/// Streaming ASR endpoint.
pub const VOLCENGINE_STREAM_URL: &str =
    "wss://openspeech.bytedance.com/api/v3/sauc/bigmodel_async";
