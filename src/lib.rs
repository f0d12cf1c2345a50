//! Inbox Assist: a conversational assistant over a personal mailbox.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod mail;
pub mod repl;
pub mod tools;
