//! Syntax highlighting for code cards.
//!
//! Highlighting always runs on the card's own copy of the text and produces
//! fresh ANSI strings; the raw code kept for clipboard copies is never
//! touched. Unknown languages fall back to unstyled lines.

use std::sync::OnceLock;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::as_24_bit_terminal_escaped;

struct Assets {
    syntax_set: SyntaxSet,
    theme: Theme,
}

fn assets() -> &'static Assets {
    static ASSETS: OnceLock<Assets> = OnceLock::new();
    ASSETS.get_or_init(|| {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let mut themes = ThemeSet::load_defaults();
        let theme = themes
            .themes
            .remove("base16-ocean.dark")
            .or_else(|| themes.themes.into_iter().next().map(|(_, theme)| theme))
            .expect("syntect ships with at least one theme");
        Assets { syntax_set, theme }
    })
}

/// Highlight `code` as `lang`, returning one ANSI-styled string per line.
/// When `lang` has no matching syntax definition (or is empty), lines come
/// back unstyled.
pub fn highlight_lines(lang: &str, code: &str) -> Vec<String> {
    let assets = assets();
    let syntax = if lang.is_empty() {
        None
    } else {
        assets
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| assets.syntax_set.find_syntax_by_extension(lang))
    };

    let Some(syntax) = syntax else {
        return code.lines().map(ToString::to_string).collect();
    };

    let mut highlighter = HighlightLines::new(syntax, &assets.theme);
    code.lines()
        .map(|line| match highlighter.highlight_line(line, &assets.syntax_set) {
            Ok(ranges) => format!("{}\x1b[0m", as_24_bit_terminal_escaped(&ranges, false)),
            Err(_) => line.to_string(),
        })
        .collect()
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_language_gets_ansi_styling() {
        let lines = highlight_lines("rust", "fn main() {}");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("\x1b["));
        assert!(lines[0].contains("main"));
    }

    #[test]
    fn unknown_language_passes_through() {
        let lines = highlight_lines("notalang", "plain text");
        assert_eq!(lines, vec!["plain text".to_string()]);
    }

    #[test]
    fn empty_language_passes_through() {
        let lines = highlight_lines("", "a\nb");
        assert_eq!(lines, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn highlighting_does_not_consume_input() {
        let code = "print('hi')";
        let _ = highlight_lines("python", code);
        assert_eq!(code, "print('hi')");
    }
}
