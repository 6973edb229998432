//! Slash commands for the interactive loop.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Quit,
    Cards,
    Model(Option<String>),
    Copy(Option<usize>),
    Unknown { name: String },
}

impl SlashCommand {
    pub fn parse(input: &str) -> Option<Self> {
        let line = input.trim();
        if !line.starts_with('/') {
            return None;
        }
        let mut parts = line[1..].split_whitespace();
        let name = parts.next()?.to_ascii_lowercase();
        let arg = parts.next();

        let cmd = match name.as_str() {
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            "cards" => Self::Cards,
            "model" => Self::Model(arg.map(ToString::to_string)),
            "copy" => Self::Copy(arg.and_then(|a| a.parse().ok())),
            other => Self::Unknown {
                name: other.to_string(),
            },
        };
        Some(cmd)
    }
}

pub const HELP_TEXT: &str = "\
/help         show this help
/cards        list code cards in the current document
/copy N       copy code card N to the clipboard
/model [NAME] show or switch the model
/quit         exit";

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(SlashCommand::parse("/help"), Some(SlashCommand::Help));
        assert_eq!(SlashCommand::parse("/quit"), Some(SlashCommand::Quit));
        assert_eq!(SlashCommand::parse("/copy 2"), Some(SlashCommand::Copy(Some(2))));
        assert_eq!(SlashCommand::parse("/copy"), Some(SlashCommand::Copy(None)));
        assert_eq!(
            SlashCommand::parse("/model gpt-5"),
            Some(SlashCommand::Model(Some("gpt-5".to_string())))
        );
    }

    #[test]
    fn non_slash_input_is_a_prompt() {
        assert_eq!(SlashCommand::parse("write me a parser"), None);
        assert_eq!(SlashCommand::parse("  plain  "), None);
    }

    #[test]
    fn unknown_command_is_reported_by_name() {
        assert_eq!(
            SlashCommand::parse("/nope 1 2"),
            Some(SlashCommand::Unknown {
                name: "nope".to_string()
            })
        );
    }

    #[test]
    fn copy_with_bad_number_is_none() {
        assert_eq!(SlashCommand::parse("/copy abc"), Some(SlashCommand::Copy(None)));
    }
}
