use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const FALLBACK_CODE_LABEL: &str = "Code";

/// Per-workspace runtime directory for settings and logs.
pub fn runtime_dir(workspace: &Path) -> PathBuf {
    workspace.join(".codegen")
}

// ── Request / reply types ───────────────────────────────────────────────

/// One submission to the generation service. Built once per prompt and
/// discarded after the call resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub stream: bool,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, cfg: &GeneratorConfig) -> Self {
        Self {
            prompt: prompt.into(),
            model: cfg.model.clone(),
            stream: cfg.stream,
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        }
    }
}

fn default_finish_reason() -> String {
    "stop".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReply {
    pub text: String,
    #[serde(default = "default_finish_reason")]
    pub finish_reason: String,
}

impl GenerationReply {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A single chunk emitted during streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// A content text delta. Deltas must be appended in arrival order.
    ContentDelta(String),
    /// Streaming is done; the final assembled reply follows.
    Done,
}

/// Callback type for receiving streaming chunks.
/// Uses `Arc<dyn Fn>` so it can be cloned into a worker thread.
pub type StreamCallback = std::sync::Arc<dyn Fn(StreamChunk) + Send + Sync>;

// ── Error taxonomy ──────────────────────────────────────────────────────

/// Failures raised by the generation client. Every variant is terminal for
/// the submission that triggered it; the controller maps each one to a
/// user-visible message in the display area.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("no API key configured (set {env} or llm.api_key in settings)")]
    MissingApiKey { env: String },
    /// The service accepted the request but never produced a stream.
    #[error("no response received")]
    NoResponse,
    #[error("API error {status}: {detail}")]
    Api { status: u16, detail: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("stream error: {0}")]
    Stream(String),
}

// ── Configuration ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    pub max_retries: u8,
    pub retry_base_ms: u64,
    pub stream: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-5-nano".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            api_key_env: "CODEGEN_API_KEY".to_string(),
            temperature: 0.2,
            max_tokens: 4096,
            timeout_seconds: 120,
            max_retries: 3,
            retry_base_ms: 400,
            stream: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Label used for code cards whose fence carries no language token.
    pub code_label_fallback: String,
    pub color: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            code_label_fallback: FALLBACK_CODE_LABEL.to_string(),
            color: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: GeneratorConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    pub fn user_settings_path() -> Option<PathBuf> {
        let home = std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())?;
        Some(Path::new(&home).join(".codegen/settings.json"))
    }

    pub fn project_settings_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("settings.json")
    }

    /// Load configuration by deep-merging JSON layers over the built-in
    /// defaults: user settings first, then project settings.
    pub fn load(workspace: &Path) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;

        let mut paths = Vec::new();
        if let Some(user) = Self::user_settings_path() {
            paths.push(user);
        }
        paths.push(Self::project_settings_path(workspace));

        for path in paths {
            if !path.exists() {
                continue;
            }
            let raw = fs::read_to_string(path)?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            merge_json_value(&mut merged, &value);
        }

        Ok(serde_json::from_value(merged)?)
    }

    pub fn save(&self, workspace: &Path) -> Result<()> {
        let path = Self::project_settings_path(workspace);
        fs::create_dir_all(
            path.parent()
                .ok_or_else(|| anyhow::anyhow!("invalid config path"))?,
        )?;
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

fn merge_json_value(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_obj), serde_json::Value::Object(overlay_obj)) => {
            for (key, overlay_value) in overlay_obj {
                if let Some(base_value) = base_obj.get_mut(key) {
                    merge_json_value(base_value, overlay_value);
                } else {
                    base_obj.insert(key.clone(), overlay_value.clone());
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_config_defaults() {
        let cfg = GeneratorConfig::default();
        let req = GenerationRequest::new("  hello  ", &cfg);
        assert_eq!(req.model, cfg.model);
        assert!(req.stream);
        assert_eq!(req.max_tokens, 4096);
    }

    #[test]
    fn merge_overlay_wins_and_preserves_siblings() {
        let mut base = serde_json::json!({
            "llm": {"model": "gpt-5-nano", "stream": true},
            "ui": {"color": true}
        });
        let overlay = serde_json::json!({"llm": {"model": "gpt-5"}});
        merge_json_value(&mut base, &overlay);
        assert_eq!(base["llm"]["model"], "gpt-5");
        assert_eq!(base["llm"]["stream"], true);
        assert_eq!(base["ui"]["color"], true);
    }

    #[test]
    fn load_merges_project_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_dir = runtime_dir(dir.path());
        fs::create_dir_all(&cfg_dir).expect("mkdir");
        fs::write(
            cfg_dir.join("settings.json"),
            r#"{"llm": {"model": "custom-model", "stream": false}}"#,
        )
        .expect("write settings");

        let cfg = AppConfig::load(dir.path()).expect("load");
        assert_eq!(cfg.llm.model, "custom-model");
        assert!(!cfg.llm.stream);
        // Untouched fields keep their defaults.
        assert_eq!(cfg.llm.max_retries, 3);
        assert_eq!(cfg.ui.code_label_fallback, "Code");
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cfg = AppConfig::default();
        cfg.llm.model = "saved-model".to_string();
        cfg.save(dir.path()).expect("save");
        let loaded = AppConfig::load(dir.path()).expect("load");
        assert_eq!(loaded.llm.model, "saved-model");
    }

    #[test]
    fn generate_error_messages() {
        let err = GenerateError::NoResponse;
        assert_eq!(err.to_string(), "no response received");
        let err = GenerateError::Api {
            status: 429,
            detail: "rate limited".to_string(),
        };
        assert!(err.to_string().contains("429"));
    }
}
