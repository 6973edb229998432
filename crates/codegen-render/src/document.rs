//! Line-oriented document model for generated markdown.
//!
//! `Document::parse` is a pure function of the full input text: it is called
//! once per streaming chunk with the whole accumulated buffer and recomputes
//! the block list from scratch. Classification follows GitHub-flavored
//! conventions with hard line breaks: every source line maps to its own
//! block, single newlines are never collapsed into the preceding line.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: usize, text: String },
    Text(String),
    Bullet { indent: usize, text: String },
    Numbered { marker: String, text: String },
    Task { done: bool, text: String },
    Quote(String),
    Rule,
    TableRow { cells: Vec<String>, separator: bool },
    /// A fenced code region. `lang` is the fence's language token, possibly
    /// empty. An unterminated trailing fence still yields a code block so
    /// that a streaming prefix renders as code immediately.
    Code { lang: String, text: String },
    Blank,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn parse(text: &str) -> Self {
        let mut blocks = Vec::new();
        let mut fence: Option<(String, Vec<String>)> = None;

        for line in text.lines() {
            if line.starts_with("```") {
                match fence.take() {
                    None => {
                        let lang = line.trim_start_matches('`').trim().to_string();
                        fence = Some((lang, Vec::new()));
                    }
                    Some((lang, lines)) => {
                        blocks.push(Block::Code {
                            lang,
                            text: lines.join("\n"),
                        });
                    }
                }
                continue;
            }
            if let Some((_, lines)) = fence.as_mut() {
                lines.push(line.to_string());
                continue;
            }
            blocks.push(classify(line));
        }

        // Streaming may leave the final fence open; keep its content visible.
        if let Some((lang, lines)) = fence {
            blocks.push(Block::Code {
                lang,
                text: lines.join("\n"),
            });
        }

        Self { blocks }
    }

    /// Fenced code regions in document order.
    pub fn code_blocks(&self) -> impl Iterator<Item = (&str, &str)> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Code { lang, text } => Some((lang.as_str(), text.as_str())),
            _ => None,
        })
    }
}

fn classify(line: &str) -> Block {
    if line.trim().is_empty() {
        return Block::Blank;
    }
    if line == "---" || line == "***" || line == "___" {
        return Block::Rule;
    }

    if line.starts_with('#') && !line.starts_with("#!") {
        let trimmed = line.trim_start_matches('#');
        let level = line.len() - trimmed.len();
        if level <= 6 {
            let heading = trimmed.strip_prefix(' ').unwrap_or(trimmed);
            if !heading.is_empty() {
                return Block::Heading {
                    level,
                    text: heading.to_string(),
                };
            }
        }
    }

    if let Some(quote) = line.strip_prefix("> ") {
        return Block::Quote(quote.to_string());
    }

    if let Some(rest) = strip_any(line, &["- [ ] ", "* [ ] "]) {
        return Block::Task {
            done: false,
            text: rest.to_string(),
        };
    }
    if let Some(rest) = strip_any(line, &["- [x] ", "* [x] ", "- [X] ", "* [X] "]) {
        return Block::Task {
            done: true,
            text: rest.to_string(),
        };
    }

    let stripped = line.trim_start();
    let indent = line.len() - stripped.len();
    if let Some(item) = strip_any(stripped, &["- ", "* "]) {
        return Block::Bullet {
            indent,
            text: item.to_string(),
        };
    }

    if let Some(dot_pos) = line.find(". ") {
        if dot_pos > 0 && dot_pos <= 4 && line[..dot_pos].chars().all(|c| c.is_ascii_digit()) {
            return Block::Numbered {
                marker: line[..dot_pos + 1].to_string(),
                text: line[dot_pos + 2..].to_string(),
            };
        }
    }

    if line.len() >= 2 && line.starts_with('|') && line.ends_with('|') {
        let inner = &line[1..line.len() - 1];
        let separator = inner
            .chars()
            .all(|c| c == '-' || c == '|' || c == ':' || c == ' ');
        let cells = inner
            .split('|')
            .map(|cell| cell.trim().to_string())
            .collect();
        return Block::TableRow { cells, separator };
    }

    Block::Text(line.to_string())
}

fn strip_any<'a>(line: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes.iter().find_map(|p| line.strip_prefix(p))
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_line_is_its_own_block() {
        let doc = Document::parse("first\nsecond");
        assert_eq!(
            doc.blocks,
            vec![
                Block::Text("first".to_string()),
                Block::Text("second".to_string()),
            ]
        );
    }

    #[test]
    fn fenced_code_with_language() {
        let doc = Document::parse("before\n```python\nprint(1)\nprint(2)\n```\nafter");
        let code: Vec<_> = doc.code_blocks().collect();
        assert_eq!(code, vec![("python", "print(1)\nprint(2)")]);
        assert_eq!(doc.blocks.len(), 3);
    }

    #[test]
    fn unterminated_fence_is_still_code() {
        let doc = Document::parse("```rust\nfn main() {");
        let code: Vec<_> = doc.code_blocks().collect();
        assert_eq!(code, vec![("rust", "fn main() {")]);
    }

    #[test]
    fn fence_without_language_token() {
        let doc = Document::parse("```\nplain\n```");
        let code: Vec<_> = doc.code_blocks().collect();
        assert_eq!(code, vec![("", "plain")]);
    }

    #[test]
    fn classifies_line_kinds() {
        let doc = Document::parse(
            "# Title\n> quoted\n- item\n- [ ] todo\n1. first\n---\n|a|b|\n|-|-|\n\ntext",
        );
        assert!(matches!(doc.blocks[0], Block::Heading { level: 1, .. }));
        assert!(matches!(doc.blocks[1], Block::Quote(_)));
        assert!(matches!(doc.blocks[2], Block::Bullet { .. }));
        assert!(matches!(doc.blocks[3], Block::Task { done: false, .. }));
        assert!(matches!(doc.blocks[4], Block::Numbered { .. }));
        assert!(matches!(doc.blocks[5], Block::Rule));
        assert!(matches!(
            doc.blocks[6],
            Block::TableRow {
                separator: false,
                ..
            }
        ));
        assert!(matches!(
            doc.blocks[7],
            Block::TableRow {
                separator: true,
                ..
            }
        ));
        assert!(matches!(doc.blocks[8], Block::Blank));
        assert!(matches!(doc.blocks[9], Block::Text(_)));
    }

    #[test]
    fn parse_is_pure_and_stable() {
        let text = "# Title\n```js\nlet x = 1;\n```";
        assert_eq!(Document::parse(text), Document::parse(text));
    }

    #[test]
    fn growing_prefix_keeps_earlier_blocks() {
        let partial = Document::parse("# Title\n```py\nx = 1");
        let full = Document::parse("# Title\n```py\nx = 1\n```\ndone");
        assert_eq!(partial.blocks[0], full.blocks[0]);
        assert_eq!(partial.code_blocks().count(), 1);
        assert_eq!(full.code_blocks().count(), 1);
    }
}
