mod command_registry;
mod commands;
mod history;
mod reply;

pub use command_registry::CHAT_HELP_COMMANDS;
pub use commands::{parse_command, ChatCommand};
pub use history::{ChatTurn, ConversationHistory, Role};
pub use reply::StructuredReply;

/// Fixed instruction prepended to every chat request. Never stored in history.
pub const SYSTEM_INSTRUCTION: &str = "You are an AI art assistant and an expert in Stable \
Diffusion (Pony XL). When the user is just chatting, answer kindly and conversationally in the \
user's language. When the user asks you to draw something or to write a prompt, you must write \
the prompt in English as Danbooru-style tags: a comma-separated list of words, not sentences.\n\
IMPORTANT: when the user asks to leave something out (for example \"no helmet\" or \"without \
glasses\"), always put that word (helmet, glasses) at the very front of the Negative Prompt.\n\
For image requests, always answer in exactly this format:\n\
Description: (a short description of the picture in the user's language)\n\
Positive Prompt: (English tags ready to copy, e.g. 1girl, solo, red armor...)\n\
Negative Prompt: (excluded words followed by the usual negative tags, e.g. helmet, beard, low \
quality, bad anatomy, extra fingers, mutation...)";

/// Reply text shown when the chat collaborator fails. The session keeps going.
pub fn error_reply(err: &anyhow::Error) -> String {
    format!("An error occurred: {err:#}")
}
