//! Incremental renderer: accumulated markdown text in, full ANSI frame out.
//!
//! `RenderSession::render` is invoked with the complete accumulated buffer on
//! every streaming chunk. Each call reparses the document, rebuilds the frame
//! from scratch, and replaces the surface's previous content wholesale, with
//! no diffing. Fenced code regions become labeled, copyable file cards.

pub mod card;
pub mod document;
mod highlight;

pub use card::{
    COPY_LABEL_COPIED, COPY_LABEL_IDLE, COPY_REVERT_DELAY, CodeCard, CopyState, CopyTracker,
};
pub use document::{Block, Document};

use anyhow::{Context, Result, anyhow};
use codegen_core::FALLBACK_CODE_LABEL;

// ── ANSI escape helpers ─────────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const ITALIC: &str = "\x1b[3m";
const UNDERLINE: &str = "\x1b[4m";
const STRIKE: &str = "\x1b[9m";
const CYAN: &str = "\x1b[36m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const GRAY: &str = "\x1b[90m";
const BG_GRAY: &str = "\x1b[48;5;236m";

// ── Collaborator traits ─────────────────────────────────────────────────

/// Where rendered frames go. Replacing is total: the previous frame is gone.
pub trait Surface {
    fn replace(&mut self, frame: &str);
}

/// System clipboard access for the card copy action.
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<()>;
}

pub struct SystemClipboard(arboard::Clipboard);

impl SystemClipboard {
    pub fn new() -> Result<Self> {
        Ok(Self(
            arboard::Clipboard::new().context("clipboard unavailable")?,
        ))
    }
}

impl Clipboard for SystemClipboard {
    fn write_text(&mut self, text: &str) -> Result<()> {
        self.0.set_text(text).context("clipboard write failed")?;
        Ok(())
    }
}

// ── Render session ──────────────────────────────────────────────────────

/// One renderer instance per submission lifecycle. Holds the copy-state
/// tracker and the card list of the most recent frame.
pub struct RenderSession {
    tracker: CopyTracker,
    cards: Vec<CodeCard>,
    color: bool,
    fallback_label: String,
}

impl RenderSession {
    pub fn new(color: bool, fallback_label: impl Into<String>) -> Self {
        Self {
            tracker: CopyTracker::default(),
            cards: Vec::new(),
            color,
            fallback_label: fallback_label.into(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(true, FALLBACK_CODE_LABEL)
    }

    /// Render `full_text` and replace the surface's content with the result.
    pub fn render(&mut self, full_text: &str, surface: &mut dyn Surface) {
        let frame = self.compose(full_text);
        surface.replace(&frame);
    }

    /// Render to an owned string without a surface.
    pub fn compose(&mut self, full_text: &str) -> String {
        let doc = Document::parse(full_text);
        self.cards = self.collect_cards(&doc);
        self.tracker.retain_visible(self.cards.len());
        self.frame(&doc)
    }

    /// Code cards of the most recently rendered frame, in document order.
    pub fn cards(&self) -> &[CodeCard] {
        &self.cards
    }

    pub fn copy_label(&self, index: usize) -> &'static str {
        self.tracker.label(index)
    }

    /// Copy card `index` (1-based) to the clipboard: writes the raw code
    /// text, flips the label to "Copied!", and schedules the fixed-delay
    /// revert keyed to this copy.
    pub fn copy_card(&self, index: usize, clipboard: &mut dyn Clipboard) -> Result<()> {
        let card = self
            .cards
            .iter()
            .find(|c| c.index == index)
            .ok_or_else(|| anyhow!("no code card {index}"))?;
        clipboard.write_text(&card.code)?;
        let generation = self.tracker.mark_copied(index);
        self.tracker.schedule_revert(index, generation);
        Ok(())
    }

    fn collect_cards(&self, doc: &Document) -> Vec<CodeCard> {
        doc.code_blocks()
            .enumerate()
            .map(|(i, (lang, code))| CodeCard {
                index: i + 1,
                label: if lang.is_empty() {
                    self.fallback_label.clone()
                } else {
                    lang.to_string()
                },
                code: code.to_string(),
            })
            .collect()
    }

    fn paint(&self, pen: &'static str) -> &'static str {
        if self.color { pen } else { "" }
    }

    fn inline(&self, text: &str) -> String {
        if self.color {
            render_inline(text)
        } else {
            text.to_string()
        }
    }

    fn frame(&self, doc: &Document) -> String {
        let mut out = String::new();
        let mut card_index = 0;
        for block in &doc.blocks {
            match block {
                Block::Code { lang, text } => {
                    card_index += 1;
                    self.push_card(&mut out, card_index, lang, text);
                }
                other => self.push_block(&mut out, other),
            }
        }
        out
    }

    fn push_block(&self, out: &mut String, block: &Block) {
        let (bold, dim, underline, cyan, green, gray, reset) = (
            self.paint(BOLD),
            self.paint(DIM),
            self.paint(UNDERLINE),
            self.paint(CYAN),
            self.paint(GREEN),
            self.paint(GRAY),
            self.paint(RESET),
        );
        match block {
            Block::Blank => out.push('\n'),
            Block::Heading { level, text } => {
                let styled = self.inline(text);
                match level {
                    1 => {
                        out.push('\n');
                        out.push_str(&format!("  {bold}{cyan}{underline}{styled}{reset}\n"));
                        out.push('\n');
                    }
                    2 => {
                        out.push('\n');
                        out.push_str(&format!("  {bold}{cyan}{styled}{reset}\n"));
                    }
                    3 => out.push_str(&format!("  {cyan}{styled}{reset}\n")),
                    _ => out.push_str(&format!("  {bold}{styled}{reset}\n")),
                }
            }
            Block::Quote(text) => {
                out.push_str(&format!("  {gray}│{reset} {dim}{}{reset}\n", self.inline(text)));
            }
            Block::Task { done: false, text } => {
                out.push_str(&format!("  {gray}☐{reset} {}\n", self.inline(text)));
            }
            Block::Task { done: true, text } => {
                out.push_str(&format!("  {green}☑{reset} {dim}{}{reset}\n", self.inline(text)));
            }
            Block::Bullet { indent, text } => {
                if *indent >= 2 {
                    let pad = " ".repeat(*indent);
                    out.push_str(&format!("  {pad}{cyan}◦{reset} {}\n", self.inline(text)));
                } else {
                    out.push_str(&format!("  {cyan}•{reset} {}\n", self.inline(text)));
                }
            }
            Block::Numbered { marker, text } => {
                out.push_str(&format!("  {cyan}{marker}{reset} {}\n", self.inline(text)));
            }
            Block::Rule => {
                out.push_str(&format!(
                    "  {gray}─────────────────────────────────────────{reset}\n"
                ));
            }
            Block::TableRow {
                separator: true,
                cells,
            } => {
                out.push_str(&format!("  {gray}|{}|{reset}\n", cells.join("|")));
            }
            Block::TableRow { cells, .. } => {
                out.push_str(&format!("  {gray}│{reset}"));
                for cell in cells {
                    out.push_str(&format!(" {} {gray}│{reset}", self.inline(cell)));
                }
                out.push('\n');
            }
            Block::Text(text) => {
                out.push_str(&format!("  {}\n", self.inline(text)));
            }
            Block::Code { .. } => unreachable!("code blocks are rendered as cards"),
        }
    }

    fn push_card(&self, out: &mut String, index: usize, lang: &str, code: &str) {
        let (bold, dim, gray, yellow, reset) = (
            self.paint(BOLD),
            self.paint(DIM),
            self.paint(GRAY),
            self.paint(YELLOW),
            self.paint(RESET),
        );
        let label = if lang.is_empty() {
            self.fallback_label.as_str()
        } else {
            lang
        };
        let copy = self.tracker.label(index);
        out.push_str(&format!(
            "  {dim}{gray}┌──{reset} {bold}File {index}: {label}{reset} {dim}{gray}──{reset} {yellow}[{copy}]{reset}\n"
        ));
        let lines = if self.color {
            highlight::highlight_lines(lang, code)
        } else {
            code.lines().map(ToString::to_string).collect()
        };
        for line in lines {
            out.push_str(&format!("  {dim}{gray}│{reset} {line}\n"));
        }
        out.push_str(&format!("  {dim}{gray}└────────{reset}\n"));
    }
}

// ── Inline markdown → ANSI ──────────────────────────────────────────────

/// Convert inline markdown (bold, italic, strikethrough, inline code) to
/// ANSI. Unmatched delimiters pass through as literal text.
fn render_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 32);
    let mut rest = text;
    let mut prev: Option<char> = None;
    let bold_italic = format!("{BOLD}{ITALIC}");
    let spans: [(&str, &str); 5] = [
        ("***", bold_italic.as_str()),
        ("**", BOLD),
        ("~~", STRIKE),
        ("__", BOLD),
        ("*", ITALIC),
    ];

    'outer: while !rest.is_empty() {
        for (delim, open) in &spans {
            // Word-internal underscores (snake_case) are not emphasis.
            if delim.starts_with('_') && prev.is_some_and(|c| c.is_alphanumeric()) {
                continue;
            }
            if let Some(stripped) = rest.strip_prefix(delim) {
                // A doubled delimiter must not be eaten by its single form.
                if *delim == "*" && stripped.starts_with('*') {
                    continue;
                }
                if let Some(end) = stripped.find(delim) {
                    if end > 0 {
                        let inner = &stripped[..end];
                        out.push_str(open);
                        out.push_str(inner);
                        out.push_str(RESET);
                        prev = inner.chars().last();
                        rest = &stripped[end + delim.len()..];
                        continue 'outer;
                    }
                }
            }
        }

        // Italic underscore, guarded against snake_case identifiers.
        if rest.starts_with('_')
            && !rest.starts_with("__")
            && !prev.is_some_and(|c| c.is_alphanumeric())
        {
            let stripped = &rest[1..];
            if let Some(end) = stripped.find('_') {
                let inner = &stripped[..end];
                if end > 0 {
                    out.push_str(ITALIC);
                    out.push_str(inner);
                    out.push_str(RESET);
                    prev = inner.chars().last();
                    rest = &stripped[end + 1..];
                    continue;
                }
            }
        }

        // Inline code spans keep their content verbatim.
        if let Some(stripped) = rest.strip_prefix('`') {
            if let Some(end) = stripped.find('`') {
                let inner = &stripped[..end];
                out.push_str(&format!("{BG_GRAY}{YELLOW} {inner} {RESET}"));
                prev = inner.chars().last();
                rest = &stripped[end + 1..];
                continue;
            }
        }

        let ch = rest.chars().next().unwrap_or('\u{fffd}');
        let len = ch.len_utf8().min(rest.len());
        out.push_str(&rest[..len]);
        prev = Some(ch);
        rest = &rest[len..];
    }

    out
}

// ── Tests ───────────────────────────────────────────────────────────────
