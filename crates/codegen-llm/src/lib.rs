//! Blocking client for the hosted chat-completions service.
//!
//! Supports single-shot completion and SSE streaming with a per-chunk
//! callback. Retries transient failures (429/5xx, timeouts) with exponential
//! backoff, honoring `Retry-After` when the server sends one.

use codegen_core::{
    GenerateError, GenerationReply, GenerationRequest, GeneratorConfig, StreamCallback, StreamChunk,
};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, RETRY_AFTER};
use serde_json::{Value, json};
use std::io::BufRead;
use std::thread;
use std::time::Duration;

/// Base delay for transport error retries (1s, 2s, 4s exponential backoff).
const NETWORK_RETRY_BASE_MS: u64 = 1000;

/// The generation service. One implementation talks HTTP; the testkit ships
/// a scripted one.
pub trait GenClient: Send + Sync {
    fn complete(&self, req: &GenerationRequest) -> Result<GenerationReply, GenerateError>;

    /// Streaming variant that invokes `cb` for each content delta as it
    /// arrives, in arrival order. Returns the fully assembled reply once the
    /// stream ends.
    fn complete_streaming(
        &self,
        req: &GenerationRequest,
        cb: StreamCallback,
    ) -> Result<GenerationReply, GenerateError>;
}

#[derive(Debug, Clone)]
pub struct HttpGenClient {
    cfg: GeneratorConfig,
    client: Client,
}

impl HttpGenClient {
    pub fn new(cfg: GeneratorConfig) -> Result<Self, GenerateError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()
            .map_err(|e| GenerateError::Transport(e.to_string()))?;
        Ok(Self { cfg, client })
    }

    fn api_key(&self) -> Result<String, GenerateError> {
        if let Some(key) = &self.cfg.api_key {
            if !key.is_empty() {
                return Ok(key.clone());
            }
        }
        std::env::var(&self.cfg.api_key_env).map_err(|_| GenerateError::MissingApiKey {
            env: self.cfg.api_key_env.clone(),
        })
    }

    fn complete_inner(&self, req: &GenerationRequest, api_key: &str) -> Result<GenerationReply, GenerateError> {
        let payload = build_payload(req, false);

        let mut last_err = GenerateError::Transport("request never sent".to_string());
        let mut attempt: u8 = 0;
        while attempt <= self.cfg.max_retries {
            let response = self
                .client
                .post(&self.cfg.endpoint)
                .bearer_auth(api_key)
                .json(&payload)
                .send();

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let retry_after = parse_retry_after_seconds(resp.headers().get(RETRY_AFTER));
                    let body = resp
                        .text()
                        .map_err(|e| GenerateError::Transport(e.to_string()))?;
                    if status.is_success() {
                        return parse_reply(&body);
                    }
                    last_err = api_error(status, &body);
                    if should_retry_status(status) && attempt < self.cfg.max_retries {
                        thread::sleep(retry_delay(self.cfg.retry_base_ms, attempt, retry_after));
                        attempt = attempt.saturating_add(1);
                        continue;
                    }
                    break;
                }
                Err(e) => {
                    last_err = GenerateError::Transport(e.to_string());
                    if should_retry_transport(&e) && attempt < self.cfg.max_retries {
                        thread::sleep(retry_delay(NETWORK_RETRY_BASE_MS, attempt, None));
                        attempt = attempt.saturating_add(1);
                        continue;
                    }
                    break;
                }
            }
        }

        Err(last_err)
    }

    fn complete_streaming_inner(
        &self,
        req: &GenerationRequest,
        api_key: &str,
        cb: StreamCallback,
    ) -> Result<GenerationReply, GenerateError> {
        let payload = build_payload(req, true);

        let mut last_err = GenerateError::Transport("request never sent".to_string());
        let mut attempt: u8 = 0;
        while attempt <= self.cfg.max_retries {
            let response = self
                .client
                .post(&self.cfg.endpoint)
                .bearer_auth(api_key)
                .json(&payload)
                .send();

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let retry_after = parse_retry_after_seconds(resp.headers().get(RETRY_AFTER));
                    if status.is_success() {
                        let reader = std::io::BufReader::new(resp);
                        return consume_sse(reader, &cb);
                    }
                    let body = resp.text().unwrap_or_default();
                    last_err = api_error(status, &body);
                    if should_retry_status(status) && attempt < self.cfg.max_retries {
                        thread::sleep(retry_delay(self.cfg.retry_base_ms, attempt, retry_after));
                        attempt = attempt.saturating_add(1);
                        continue;
                    }
                    break;
                }
                Err(e) => {
                    last_err = GenerateError::Transport(e.to_string());
                    if should_retry_transport(&e) && attempt < self.cfg.max_retries {
                        thread::sleep(retry_delay(NETWORK_RETRY_BASE_MS, attempt, None));
                        attempt = attempt.saturating_add(1);
                        continue;
                    }
                    break;
                }
            }
        }

        Err(last_err)
    }
}

impl GenClient for HttpGenClient {
    fn complete(&self, req: &GenerationRequest) -> Result<GenerationReply, GenerateError> {
        let api_key = self.api_key()?;
        self.complete_inner(req, &api_key)
    }

    fn complete_streaming(
        &self,
        req: &GenerationRequest,
        cb: StreamCallback,
    ) -> Result<GenerationReply, GenerateError> {
        let api_key = self.api_key()?;
        self.complete_streaming_inner(req, &api_key, cb)
    }
}

fn build_payload(req: &GenerationRequest, stream: bool) -> Value {
    json!({
        "model": req.model,
        "messages": [{"role": "user", "content": req.prompt}],
        "max_tokens": req.max_tokens,
        "temperature": req.temperature,
        "stream": stream,
    })
}

fn parse_reply(body: &str) -> Result<GenerationReply, GenerateError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| GenerateError::Stream(format!("malformed response body: {e}")))?;
    let choice = value
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first());
    // A success response with no choices carries no text; the caller decides
    // how to surface the empty reply.
    let text = choice
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let finish_reason = choice
        .and_then(|c| c.get("finish_reason"))
        .and_then(|v| v.as_str())
        .unwrap_or("stop")
        .to_string();
    Ok(GenerationReply {
        text,
        finish_reason,
    })
}

/// Read SSE lines, invoking `cb` for each content delta. A body that ends
/// without a single `data:` event means the service never opened a stream,
/// which surfaces as `NoResponse`.
fn consume_sse<R: BufRead>(reader: R, cb: &StreamCallback) -> Result<GenerationReply, GenerateError> {
    let mut text = String::new();
    let mut finish_reason: Option<String> = None;
    let mut saw_event = false;

    for line_result in reader.lines() {
        let line =
            line_result.map_err(|e| GenerateError::Stream(format!("stream read error: {e}")))?;
        let trimmed = line.trim();
        if !trimmed.starts_with("data:") {
            continue;
        }
        saw_event = true;
        let chunk = trimmed.trim_start_matches("data:").trim();
        if chunk == "[DONE]" {
            cb(StreamChunk::Done);
            break;
        }
        let value: Value = match serde_json::from_str(chunk) {
            Ok(v) => v,
            Err(_) => continue,
        };
        let choice = value
            .get("choices")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first());
        let Some(choice) = choice else {
            continue;
        };
        if let Some(reason) = choice.get("finish_reason").and_then(|v| v.as_str()) {
            finish_reason = Some(reason.to_string());
        }
        // Deltas with missing or null content count as empty fragments.
        if let Some(content) = choice
            .get("delta")
            .and_then(|d| d.get("content"))
            .and_then(|v| v.as_str())
        {
            text.push_str(content);
            cb(StreamChunk::ContentDelta(content.to_string()));
        }
    }

    if !saw_event {
        return Err(GenerateError::NoResponse);
    }

    Ok(GenerationReply {
        text,
        finish_reason: finish_reason.unwrap_or_else(|| "stop".to_string()),
    })
}

fn api_error(status: StatusCode, body: &str) -> GenerateError {
    // Prefer the structured error message when the body carries one.
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            } else {
                trimmed.to_string()
            }
        });
    GenerateError::Api {
        status: status.as_u16(),
        detail,
    }
}

fn should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn should_retry_transport(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn parse_retry_after_seconds(header: Option<&HeaderValue>) -> Option<Duration> {
    let secs = header?.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs))
}

fn retry_delay(base_ms: u64, attempt: u8, retry_after: Option<Duration>) -> Duration {
    if let Some(after) = retry_after {
        return after;
    }
    Duration::from_millis(base_ms.saturating_mul(1u64 << attempt.min(6)))
}

// ── Tests ───────────────────────────────────────────────────────────────
