#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CommandKind {
    Help,
    Reset,
    ShowPrompt,
    Quit,
    Sketch,
    Inpaint,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub kind: CommandKind,
}

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "help",
        kind: CommandKind::Help,
    },
    CommandSpec {
        command: "reset",
        kind: CommandKind::Reset,
    },
    CommandSpec {
        command: "clear",
        kind: CommandKind::Reset,
    },
    CommandSpec {
        command: "prompt",
        kind: CommandKind::ShowPrompt,
    },
    CommandSpec {
        command: "quit",
        kind: CommandKind::Quit,
    },
    CommandSpec {
        command: "exit",
        kind: CommandKind::Quit,
    },
];

pub(crate) const MULTI_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "sketch",
        kind: CommandKind::Sketch,
    },
    CommandSpec {
        command: "inpaint",
        kind: CommandKind::Inpaint,
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/help",
    "/reset",
    "/prompt",
    "/sketch <background> [layer...]",
    "/inpaint <background> <mask> [layer...]",
    "/quit",
];
