//! Test doubles for the generation pipeline: a scripted client, a
//! frame-recording surface, and an in-memory clipboard.

use anyhow::Result;
use codegen_core::{GenerateError, GenerationReply, GenerationRequest, StreamCallback, StreamChunk};
use codegen_llm::GenClient;
use codegen_render::{Clipboard, Surface};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What a [`ScriptedClient`] does when invoked.
#[derive(Debug, Clone)]
pub enum Script {
    /// Single-shot reply carrying this text (possibly empty).
    Reply(String),
    /// Streaming reply delivered as these chunks, in order.
    Chunks(Vec<String>),
    /// The stream never materializes.
    NoResponse,
    /// The call fails outright with a transport error.
    Fail(String),
}

pub struct ScriptedClient {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(Script::Reply(text.into()))
    }

    pub fn streaming<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Script::Chunks(chunks.into_iter().map(Into::into).collect()))
    }

    /// Number of requests issued against this client.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GenClient for ScriptedClient {
    fn complete(&self, _req: &GenerationRequest) -> Result<GenerationReply, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Reply(text) => Ok(reply(text.clone())),
            Script::Chunks(chunks) => Ok(reply(chunks.concat())),
            Script::NoResponse => Err(GenerateError::NoResponse),
            Script::Fail(detail) => Err(GenerateError::Transport(detail.clone())),
        }
    }

    fn complete_streaming(
        &self,
        _req: &GenerationRequest,
        cb: StreamCallback,
    ) -> Result<GenerationReply, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Reply(text) => {
                if !text.is_empty() {
                    cb(StreamChunk::ContentDelta(text.clone()));
                }
                cb(StreamChunk::Done);
                Ok(reply(text.clone()))
            }
            Script::Chunks(chunks) => {
                for chunk in chunks {
                    cb(StreamChunk::ContentDelta(chunk.clone()));
                }
                cb(StreamChunk::Done);
                Ok(reply(chunks.concat()))
            }
            Script::NoResponse => Err(GenerateError::NoResponse),
            Script::Fail(detail) => Err(GenerateError::Transport(detail.clone())),
        }
    }
}

fn reply(text: String) -> GenerationReply {
    GenerationReply {
        text,
        finish_reason: "stop".to_string(),
    }
}

/// Captures every frame replacement for later assertions.
#[derive(Default)]
pub struct RecordingSurface {
    pub frames: Vec<String>,
}

impl RecordingSurface {
    pub fn last(&self) -> Option<&str> {
        self.frames.last().map(String::as_str)
    }
}

impl Surface for RecordingSurface {
    fn replace(&mut self, frame: &str) {
        self.frames.push(frame.to_string());
    }
}

/// Clipboard that records written text instead of touching the system.
#[derive(Default)]
pub struct MemoryClipboard {
    pub contents: Vec<String>,
}

impl Clipboard for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<()> {
        self.contents.push(text.to_string());
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
