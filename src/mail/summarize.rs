//! Per-message summarization.
//!
//! Each message gets its own model call. Calls run with bounded
//! concurrency but results are reported in fetch order, numbered from 1.

use std::sync::Arc;

use futures::StreamExt;

use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::mail::normalize::NormalizedMessage;

pub const NOTHING_SUMMARIZED: &str = "No emails found or summarized.";

pub struct Summarizer {
    llm: Arc<dyn LlmProvider>,
    concurrency: usize,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmProvider>, concurrency: usize) -> Self {
        Self {
            llm,
            concurrency: concurrency.max(1),
        }
    }

    /// Prompt for a single message.
    pub fn prompt(message: &NormalizedMessage) -> String {
        format!(
            "Summarize this email in 1–2 short sentences.\n\
             Focus only on key points (ignore greetings/signatures).\n\n\
             From: {}\nSubject: {}\nBody:\n{}\n\nSummary:",
            message.sender, message.subject, message.body
        )
    }

    /// Summarize each message and render the numbered list.
    ///
    /// A failed call yields a placeholder line for that message only.
    pub async fn summarize(&self, messages: &[NormalizedMessage]) -> String {
        if messages.is_empty() {
            return NOTHING_SUMMARIZED.to_string();
        }

        let lines: Vec<String> = futures::stream::iter(messages.iter().cloned().enumerate())
            .map(move |(i, message)| async move {
                let request = CompletionRequest::new(vec![ChatMessage::user(Self::prompt(&message))]);
                match self.llm.complete(request).await {
                    Ok(response) => format!("{}. {}", i + 1, response.content.trim()),
                    Err(e) => {
                        tracing::warn!(index = i + 1, error = %e, "Summary call failed");
                        format!("{}. (Summary unavailable: {e})", i + 1)
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        tracing::info!(count = lines.len(), "Summarized messages");
        lines.join("\n")
    }
}
