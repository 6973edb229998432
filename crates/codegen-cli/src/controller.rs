//! Submission lifecycle: validate the prompt, call the generation client,
//! accumulate streamed chunks, and route frames (or error messages) to the
//! display surface.
//!
//! One submission at a time: a second submit while one is in flight is
//! rejected with [`SubmitOutcome::Busy`] and leaves the surface untouched.

use anyhow::Result;
use codegen_core::{GenerateError, GenerationRequest, GeneratorConfig, StreamChunk};
use codegen_llm::GenClient;
use codegen_observe::Observer;
use codegen_render::{Clipboard, RenderSession, Surface};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

pub const MSG_GENERATING: &str = "Generating...";
pub const MSG_NO_RESPONSE: &str = "No response received. Please try again.";
pub const MSG_NO_CONTENT: &str = "No content generated for this prompt.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Prompt was blank after trimming; no request, no surface change.
    Ignored,
    /// Another submission is in flight; this one was rejected.
    Busy,
    Rendered,
    /// The call succeeded but produced no text.
    Empty,
    /// The streaming call never produced a stream.
    NoResponse,
    Failed(String),
}

pub struct Controller {
    client: Arc<dyn GenClient>,
    cfg: GeneratorConfig,
    session: RenderSession,
    observer: Observer,
    in_flight: AtomicBool,
    accumulated: String,
}

impl Controller {
    pub fn new(
        client: Arc<dyn GenClient>,
        cfg: GeneratorConfig,
        session: RenderSession,
        observer: Observer,
    ) -> Self {
        Self {
            client,
            cfg,
            session,
            observer,
            in_flight: AtomicBool::new(false),
            accumulated: String::new(),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.cfg
    }

    pub fn config_mut(&mut self) -> &mut GeneratorConfig {
        &mut self.cfg
    }

    pub fn session(&self) -> &RenderSession {
        &self.session
    }

    /// Run one submission end to end. Every failure is caught here and
    /// surfaced as a frame; the returned outcome mirrors what the surface
    /// now shows.
    pub fn submit(&mut self, prompt: &str, surface: &mut dyn Surface) -> SubmitOutcome {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return SubmitOutcome::Ignored;
        }
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return SubmitOutcome::Busy;
        }
        let outcome = self.submit_inner(prompt, surface);
        self.in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    fn submit_inner(&mut self, prompt: &str, surface: &mut dyn Surface) -> SubmitOutcome {
        let req = GenerationRequest::new(prompt, &self.cfg);
        self.observer.request_started(&req.model, req.stream);
        surface.replace(MSG_GENERATING);
        self.accumulated.clear();

        if req.stream {
            self.submit_streaming(req, surface)
        } else {
            self.submit_single(req, surface)
        }
    }

    fn submit_single(&mut self, req: GenerationRequest, surface: &mut dyn Surface) -> SubmitOutcome {
        match self.client.complete(&req) {
            Ok(reply) if reply.is_empty() => {
                surface.replace(MSG_NO_CONTENT);
                self.observer.request_empty();
                SubmitOutcome::Empty
            }
            Ok(reply) => {
                self.accumulated = reply.text;
                self.session.render(&self.accumulated, surface);
                self.observer.request_rendered(1, self.accumulated.len());
                SubmitOutcome::Rendered
            }
            Err(err) => self.fail(err, surface),
        }
    }

    fn submit_streaming(
        &mut self,
        req: GenerationRequest,
        surface: &mut dyn Surface,
    ) -> SubmitOutcome {
        // The client runs on a worker thread and feeds chunks back over a
        // channel; rendering happens here so the surface sees every prefix
        // in arrival order.
        let (tx, rx) = mpsc::channel::<StreamChunk>();
        let client = Arc::clone(&self.client);
        let worker_req = req.clone();
        let worker = thread::spawn(move || {
            client.complete_streaming(
                &worker_req,
                Arc::new(move |chunk| {
                    let _ = tx.send(chunk);
                }),
            )
        });

        let mut chunk_count = 0usize;
        for chunk in rx {
            if let StreamChunk::ContentDelta(text) = chunk {
                chunk_count += 1;
                self.accumulated.push_str(&text);
                self.session.render(&self.accumulated, surface);
            }
        }

        match worker.join() {
            Ok(Ok(_reply)) => {
                if self.accumulated.is_empty() {
                    surface.replace(MSG_NO_CONTENT);
                    self.observer.request_empty();
                    SubmitOutcome::Empty
                } else {
                    self.observer
                        .request_rendered(chunk_count, self.accumulated.len());
                    SubmitOutcome::Rendered
                }
            }
            Ok(Err(err)) => self.fail(err, surface),
            Err(_) => self.fail(
                GenerateError::Stream("generation worker panicked".to_string()),
                surface,
            ),
        }
    }

    fn fail(&self, err: GenerateError, surface: &mut dyn Surface) -> SubmitOutcome {
        self.observer.request_failed(&err.to_string());
        if matches!(err, GenerateError::NoResponse) {
            surface.replace(MSG_NO_RESPONSE);
            SubmitOutcome::NoResponse
        } else {
            surface.replace(&format!("Error: {err}"));
            SubmitOutcome::Failed(err.to_string())
        }
    }

    /// Copy code card `index` of the last rendered document.
    pub fn copy_card(&self, index: usize, clipboard: &mut dyn Clipboard) -> Result<()> {
        self.session.copy_card(index, clipboard)?;
        self.observer.card_copied(index);
        Ok(())
    }

    #[cfg(test)]
    fn force_in_flight(&self, value: bool) {
        self.in_flight.store(value, Ordering::SeqCst);
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use codegen_testkit::{MemoryClipboard, RecordingSurface, Script, ScriptedClient};

    fn controller_with(script: Script, stream: bool) -> (Controller, Arc<ScriptedClient>) {
        let client = Arc::new(ScriptedClient::new(script));
        let cfg = GeneratorConfig {
            stream,
            ..GeneratorConfig::default()
        };
        let dir = tempfile::tempdir().expect("tempdir");
        let observer = Observer::new(dir.path()).expect("observer");
        let session = RenderSession::new(false, "Code");
        (
            Controller::new(Arc::clone(&client) as Arc<dyn GenClient>, cfg, session, observer),
            client,
        )
    }

    #[test]
    fn blank_prompt_is_ignored_without_a_request() {
        let (mut controller, client) = controller_with(Script::Reply("x".to_string()), false);
        let mut surface = RecordingSurface::default();
        assert_eq!(controller.submit("   \n\t", &mut surface), SubmitOutcome::Ignored);
        assert!(surface.frames.is_empty());
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn single_shot_renders_the_reply_once() {
        let (mut controller, client) = controller_with(Script::Reply("hello".to_string()), false);
        let mut surface = RecordingSurface::default();
        assert_eq!(controller.submit("hi", &mut surface), SubmitOutcome::Rendered);
        assert_eq!(client.call_count(), 1);
        // Placeholder frame, then exactly one rendered frame.
        assert_eq!(surface.frames.len(), 2);
        assert_eq!(surface.frames[0], MSG_GENERATING);
        let mut fresh = RenderSession::new(false, "Code");
        assert_eq!(surface.frames[1], fresh.compose("hello"));
    }

    #[test]
    fn single_shot_without_text_reports_no_content() {
        let (mut controller, _) = controller_with(Script::Reply(String::new()), false);
        let mut surface = RecordingSurface::default();
        assert_eq!(controller.submit("hi", &mut surface), SubmitOutcome::Empty);
        assert_eq!(surface.last(), Some(MSG_NO_CONTENT));
    }

    #[test]
    fn streaming_renders_every_prefix_in_order() {
        let (mut controller, _) =
            controller_with(Script::Chunks(vec!["He".to_string(), "llo".to_string()]), true);
        let mut surface = RecordingSurface::default();
        assert_eq!(controller.submit("hi", &mut surface), SubmitOutcome::Rendered);

        let mut fresh = RenderSession::new(false, "Code");
        let expected = vec![
            MSG_GENERATING.to_string(),
            fresh.compose("He"),
            fresh.compose("Hello"),
        ];
        assert_eq!(surface.frames, expected);
    }

    #[test]
    fn streaming_without_a_stream_reports_no_response() {
        let (mut controller, _) = controller_with(Script::NoResponse, true);
        let mut surface = RecordingSurface::default();
        assert_eq!(controller.submit("hi", &mut surface), SubmitOutcome::NoResponse);
        // Placeholder then the error message; the renderer never ran.
        assert_eq!(
            surface.frames,
            vec![MSG_GENERATING.to_string(), MSG_NO_RESPONSE.to_string()]
        );
    }

    #[test]
    fn streaming_with_no_chunks_reports_no_content() {
        let (mut controller, _) = controller_with(Script::Chunks(Vec::new()), true);
        let mut surface = RecordingSurface::default();
        assert_eq!(controller.submit("hi", &mut surface), SubmitOutcome::Empty);
        assert_eq!(surface.last(), Some(MSG_NO_CONTENT));
    }

    #[test]
    fn failures_surface_as_an_error_frame() {
        let (mut controller, _) = controller_with(Script::Fail("boom".to_string()), true);
        let mut surface = RecordingSurface::default();
        let outcome = controller.submit("hi", &mut surface);
        assert!(matches!(outcome, SubmitOutcome::Failed(_)));
        let last = surface.last().expect("frame");
        assert!(last.starts_with("Error: "));
        assert!(last.contains("boom"));
    }

    #[test]
    fn concurrent_submission_is_rejected() {
        let (mut controller, client) = controller_with(Script::Reply("x".to_string()), false);
        controller.force_in_flight(true);
        let mut surface = RecordingSurface::default();
        assert_eq!(controller.submit("hi", &mut surface), SubmitOutcome::Busy);
        assert!(surface.frames.is_empty());
        assert_eq!(client.call_count(), 0);
        controller.force_in_flight(false);
        assert_eq!(controller.submit("hi", &mut surface), SubmitOutcome::Rendered);
    }

    #[test]
    fn buffer_resets_between_submissions() {
        let (mut controller, _) =
            controller_with(Script::Chunks(vec!["abc".to_string()]), true);
        let mut surface = RecordingSurface::default();
        controller.submit("one", &mut surface);
        controller.submit("two", &mut surface);
        let mut fresh = RenderSession::new(false, "Code");
        // Second submission starts from an empty buffer, not "abcabc".
        assert_eq!(surface.last(), Some(fresh.compose("abc").as_str()));
    }

    #[test]
    fn copy_card_goes_through_the_session() {
        let (mut controller, _) = controller_with(
            Script::Reply("```python\nprint(1)\n```".to_string()),
            false,
        );
        let mut surface = RecordingSurface::default();
        controller.submit("hi", &mut surface);
        let mut clipboard = MemoryClipboard::default();
        controller.copy_card(1, &mut clipboard).expect("copy");
        assert_eq!(clipboard.contents, vec!["print(1)"]);
        assert!(controller.copy_card(2, &mut clipboard).is_err());
    }
}
