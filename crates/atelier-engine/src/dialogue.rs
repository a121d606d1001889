use atelier_contracts::chat::{error_reply, ConversationHistory, SYSTEM_INSTRUCTION};
use atelier_contracts::events::EventWriter;
use serde_json::json;

use crate::chat::ChatCompletion;
use crate::http::{error_chain_text, map_object};

/// Owns one conversation with the chat collaborator.
///
/// Every turn appends exactly two entries (user message, reply) to the history, including turns
/// where the collaborator failed and the reply is an error text.
pub struct DialogueController<C> {
    chat: C,
    history: ConversationHistory,
    events: EventWriter,
}

impl<C: ChatCompletion> DialogueController<C> {
    pub fn new(chat: C, events: EventWriter) -> Self {
        Self {
            chat,
            history: ConversationHistory::new(),
            events,
        }
    }

    pub fn turn(&mut self, user_message: &str) -> String {
        let messages = self
            .history
            .request_messages(SYSTEM_INSTRUCTION, user_message);
        let (reply, failed) = match self.chat.complete(&messages) {
            Ok(reply) => (reply, false),
            Err(err) => {
                tracing::warn!(error = %error_chain_text(&err, 1024), "chat completion failed");
                (error_reply(&err), true)
            }
        };

        self.history.push_user(user_message);
        self.history.push_assistant(reply.clone());
        self.events.record(
            "chat_turn",
            map_object(json!({
                "reply_chars": reply.chars().count(),
                "failed": failed,
                "history_len": self.history.len(),
            })),
        );
        reply
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;

    use anyhow::{bail, Result};
    use atelier_contracts::chat::{ChatTurn, Role, SYSTEM_INSTRUCTION};
    use atelier_contracts::events::EventWriter;
    use serde_json::Value;

    use super::DialogueController;
    use crate::chat::ChatCompletion;

    #[derive(Default)]
    struct ScriptedChat {
        seen: RefCell<Vec<Vec<ChatTurn>>>,
    }

    impl ChatCompletion for ScriptedChat {
        fn complete(&self, messages: &[ChatTurn]) -> Result<String> {
            self.seen.borrow_mut().push(messages.to_vec());
            Ok(format!("reply #{}", self.seen.borrow().len()))
        }
    }

    struct DownChat;

    impl ChatCompletion for DownChat {
        fn complete(&self, _messages: &[ChatTurn]) -> Result<String> {
            bail!("connection refused")
        }
    }

    #[test]
    fn requests_carry_system_history_and_new_message() {
        let mut dialogue = DialogueController::new(ScriptedChat::default(), EventWriter::disabled());
        assert_eq!(dialogue.turn("hello"), "reply #1");
        assert_eq!(dialogue.turn("draw a knight"), "reply #2");

        let seen = dialogue.chat.seen.borrow();
        let second = &seen[1];
        assert_eq!(second.len(), 4);
        assert_eq!(second[0], ChatTurn::system(SYSTEM_INSTRUCTION));
        assert_eq!(second[1], ChatTurn::user("hello"));
        assert_eq!(second[2], ChatTurn::assistant("reply #1"));
        assert_eq!(second[3], ChatTurn::user("draw a knight"));
        assert_eq!(dialogue.history().len(), 4);
    }

    #[test]
    fn failed_turn_still_grows_history_by_two() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let mut dialogue = DialogueController::new(DownChat, EventWriter::new(&events_path, "s1"));

        let reply = dialogue.turn("hi");
        assert!(!reply.is_empty());
        assert!(reply.contains("connection refused"));

        let turns = dialogue.history().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].content, reply);

        let content = fs::read_to_string(&events_path)?;
        let event: Value = serde_json::from_str(content.lines().next().unwrap_or(""))?;
        assert_eq!(event["type"], "chat_turn");
        assert_eq!(event["failed"], true);
        assert_eq!(event["history_len"], 2);
        Ok(())
    }

    #[test]
    fn reset_clears_history() {
        let mut dialogue = DialogueController::new(ScriptedChat::default(), EventWriter::disabled());
        dialogue.turn("hello");
        dialogue.reset();
        assert!(dialogue.history().is_empty());

        dialogue.turn("again");
        let seen = dialogue.chat.seen.borrow();
        assert_eq!(seen[1].len(), 2);
    }
}
