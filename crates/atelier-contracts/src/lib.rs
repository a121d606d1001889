pub mod chat;
pub mod config;
pub mod events;
pub mod jobs;
pub mod prompts;
