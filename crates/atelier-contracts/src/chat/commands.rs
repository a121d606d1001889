use super::command_registry::{CommandKind, CommandSpec, MULTI_PATH_COMMANDS, NO_ARG_COMMANDS};

/// One line of chat input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Noop,
    Message(String),
    Help,
    Reset,
    ShowPrompt,
    Quit,
    Sketch { paths: Vec<String> },
    Inpaint { paths: Vec<String> },
    Unknown { command: String, arg: String },
}

fn find_kind(command: &str, specs: &[CommandSpec]) -> Option<CommandKind> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.kind)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

pub fn parse_command(text: &str) -> ChatCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return ChatCommand::Noop;
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(kind) = find_kind(&command, NO_ARG_COMMANDS) {
                return match kind {
                    CommandKind::Help => ChatCommand::Help,
                    CommandKind::Reset => ChatCommand::Reset,
                    CommandKind::ShowPrompt => ChatCommand::ShowPrompt,
                    _ => ChatCommand::Quit,
                };
            }

            if let Some(kind) = find_kind(&command, MULTI_PATH_COMMANDS) {
                let paths = parse_path_args(arg);
                return match kind {
                    CommandKind::Inpaint => ChatCommand::Inpaint { paths },
                    _ => ChatCommand::Sketch { paths },
                };
            }

            return ChatCommand::Unknown {
                command,
                arg: arg.to_string(),
            };
        }
    }

    ChatCommand::Message(raw_trimmed.to_string())
}
