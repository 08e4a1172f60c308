//! Optional LLM (Ark) rewrite client for in-flight transcript smoothing.
//!
//! `rewrite` is the only entrypoint: given the current snapshot and a little trailing
//! context, it returns a polished version of the text, or the input unchanged if
//! credentials are absent or the call fails for any reason. The underlying Ark SDK is
//! a blocking streaming client, so the call is dispatched to a blocking worker thread.

use std::time::Duration;

use crate::error::TranscribeError;
use crate::state::VolcengineConfig;

const SYSTEM_PROMPT: &str = "你是语音助理，请对以下流式 ASR 文本进行实时润色和纠错。保持原意，修正错别字和口语冗余。仅输出修正后的文本。";

const ARK_CHAT_COMPLETIONS_URL: &str = "https://ark.cn-beijing.volces.com/api/v3/chat/completions";

/// Rewrites `asr_text` using the configured Ark model, with `history` (already joined)
/// as trailing context. Falls back to `asr_text` unchanged on any failure, per the
/// "never fatal" error policy for LLM correction.
pub async fn rewrite(config: &VolcengineConfig, asr_text: &str, history: &str) -> String {
    if !config.ark_valid() {
        return asr_text.to_string();
    }
    if asr_text.trim().is_empty() {
        return String::new();
    }

    let config = config.clone();
    let asr_text_owned = asr_text.to_string();
    let history_owned = history.to_string();
    let fallback = asr_text.to_string();

    match tokio::task::spawn_blocking(move || {
        correct_stream_sync(&config, &asr_text_owned, &history_owned)
    })
    .await
    {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            log::warn!("[Correction] rewrite failed, falling back to raw snapshot: {e}");
            fallback
        }
        Err(e) => {
            log::warn!("[Correction] rewrite task panicked, falling back to raw snapshot: {e}");
            fallback
        }
    }
}

fn user_message(asr_text: &str, history: &str) -> String {
    if history.is_empty() {
        format!("当前待纠错: {asr_text}")
    } else {
        format!("历史文本: {history}\n\n当前待纠错: {asr_text}")
    }
}

fn correct_stream_sync(
    config: &VolcengineConfig,
    asr_text: &str,
    history: &str,
) -> Result<String, TranscribeError> {
    let body = serde_json::json!({
        "model": config.ark_model_id,
        "messages": [
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": user_message(asr_text, history)},
        ],
        "temperature": 0.3,
        "stream": true,
        "thinking": {"type": "disabled"},
    });

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| TranscribeError::LLMError(e.to_string()))?;

    let response = client
        .post(ARK_CHAT_COMPLETIONS_URL)
        .bearer_auth(&config.ark_api_key)
        .json(&body)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|e| TranscribeError::LLMError(e.to_string()))?;

    let raw = response
        .text()
        .map_err(|e| TranscribeError::LLMError(e.to_string()))?;

    Ok(concatenate_stream_chunks(&raw).trim().to_string())
}

/// Parses an SSE-style `data: {...}` stream of chat-completion chunks and concatenates
/// each chunk's `choices[0].delta.content`, stopping at the `[DONE]` sentinel.
fn concatenate_stream_chunks(body: &str) -> String {
    let mut out = String::new();
    for line in body.lines() {
        let Some(data) = line.trim().strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data == "[DONE]" {
            break;
        }
        let Ok(chunk) = serde_json::from_str::<serde_json::Value>(data) else {
            continue;
        };
        if let Some(delta) = chunk["choices"][0]["delta"]["content"].as_str() {
            out.push_str(delta);
        }
    }
    out
}
