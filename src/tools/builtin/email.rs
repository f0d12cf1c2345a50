//! Mailbox tools: send, retrieve and summarize.
//!
//! Mail failures are reported to the model as text rather than as tool
//! errors, so it can relay them to the operator. A `ToolError` means
//! malformed parameters or a blocking mail task that died.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::error::MailError;
use crate::mail::fetch::{FetchedMessage, MailStore, fetch_recent};
use crate::mail::normalize::{NormalizeOptions, normalize};
use crate::mail::smtp::{MailSender, OutgoingEmail};
use crate::mail::summarize::Summarizer;
use crate::tools::registry::ToolRegistry;
use crate::tools::tool::{Tool, ToolError, ToolOutput, optional_i64, require_str};

/// Default number of messages when the model does not say.
pub const DEFAULT_MAX_EMAILS: i64 = 10;

pub const NO_EMAILS_FOUND: &str = "No emails found in the inbox.";

/// Register the three mailbox tools.
pub fn register_email_tools(
    registry: &ToolRegistry,
    store: Arc<dyn MailStore>,
    sender: Arc<dyn MailSender>,
    summarizer: Arc<Summarizer>,
) {
    registry.register_sync(Arc::new(SendEmailTool::new(sender)));
    registry.register_sync(Arc::new(RetrieveEmailsTool::new(store.clone())));
    registry.register_sync(Arc::new(SummarizeEmailsTool::new(store, summarizer)));
}

/// Run a blocking fetch off the async runtime.
///
/// The outer error means the blocking task itself died; the inner one is
/// an ordinary mail failure.
async fn fetch_blocking(
    store: Arc<dyn MailStore>,
    max_emails: i64,
) -> Result<Result<Vec<FetchedMessage>, MailError>, ToolError> {
    tokio::task::spawn_blocking(move || fetch_recent(store.as_ref(), max_emails))
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("fetch task failed: {e}")))
}

/// Render fetched messages as the retrieval listing.
pub fn render_retrieval(messages: &[FetchedMessage]) -> String {
    if messages.is_empty() {
        return NO_EMAILS_FOUND.to_string();
    }
    messages
        .iter()
        .map(|m| match m {
            FetchedMessage::Message { raw, .. } => normalize(raw, NormalizeOptions::RETRIEVAL).render(),
            FetchedMessage::Failed { id } => format!("Email ID {id}: Failed to fetch email"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Sends a plain-text email from the configured account.
pub struct SendEmailTool {
    sender: Arc<dyn MailSender>,
}

impl SendEmailTool {
    pub fn new(sender: Arc<dyn MailSender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl Tool for SendEmailTool {
    fn name(&self) -> &str {
        "send_email"
    }

    fn description(&self) -> &str {
        "Send a plain-text email from the user's account to a single recipient."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "recipient": {
                    "type": "string",
                    "description": "Email address of the recipient"
                },
                "subject": {
                    "type": "string",
                    "description": "Subject line"
                },
                "body": {
                    "type": "string",
                    "description": "Plain-text message body"
                }
            },
            "required": ["recipient", "subject", "body"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let email = OutgoingEmail {
            recipient: require_str(&params, "recipient")?.to_string(),
            subject: require_str(&params, "subject")?.to_string(),
            body: require_str(&params, "body")?.to_string(),
        };

        let sender = Arc::clone(&self.sender);
        let recipient = email.recipient.clone();
        let outcome = tokio::task::spawn_blocking(move || sender.send(&email))
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("send task failed: {e}")))?;

        let text = match outcome {
            Ok(()) => format!("Email sent successfully to {recipient}"),
            Err(e) => format!("Failed to send email: {e}"),
        };
        Ok(ToolOutput::text(text, start.elapsed()))
    }
}

/// Lists the newest messages in the mailbox as plain text.
pub struct RetrieveEmailsTool {
    store: Arc<dyn MailStore>,
}

impl RetrieveEmailsTool {
    pub fn new(store: Arc<dyn MailStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for RetrieveEmailsTool {
    fn name(&self) -> &str {
        "retrieve_emails"
    }

    fn description(&self) -> &str {
        "Retrieve the most recent emails from the inbox, with sender, subject, date and body."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "max_emails": {
                    "type": "integer",
                    "description": "How many of the newest emails to retrieve (default: 10)"
                }
            }
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let max_emails = optional_i64(&params, "max_emails", DEFAULT_MAX_EMAILS)?;

        let text = match fetch_blocking(Arc::clone(&self.store), max_emails).await? {
            Ok(messages) => render_retrieval(&messages),
            Err(e) => {
                tracing::warn!(error = %e, "Retrieval failed");
                format!("Failed to retrieve emails: {e}")
            }
        };
        Ok(ToolOutput::text(text, start.elapsed()))
    }
}

/// Summarizes each of the newest messages in one or two sentences.
pub struct SummarizeEmailsTool {
    store: Arc<dyn MailStore>,
    summarizer: Arc<Summarizer>,
}

impl SummarizeEmailsTool {
    pub fn new(store: Arc<dyn MailStore>, summarizer: Arc<Summarizer>) -> Self {
        Self { store, summarizer }
    }
}

#[async_trait]
impl Tool for SummarizeEmailsTool {
    fn name(&self) -> &str {
        "summarize_emails"
    }

    fn description(&self) -> &str {
        "Summarize the most recent emails in the inbox, one or two sentences each."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "max_emails": {
                    "type": "integer",
                    "description": "How many of the newest emails to summarize (default: 10)"
                }
            }
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let max_emails = optional_i64(&params, "max_emails", DEFAULT_MAX_EMAILS)?;

        let text = match fetch_blocking(Arc::clone(&self.store), max_emails).await? {
            Ok(fetched) => {
                let messages: Vec<_> = fetched
                    .iter()
                    .filter_map(|m| match m {
                        FetchedMessage::Message { raw, .. } => {
                            Some(normalize(raw, NormalizeOptions::SUMMARY))
                        }
                        FetchedMessage::Failed { .. } => None,
                    })
                    .collect();
                self.summarizer.summarize(&messages).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Summarization fetch failed");
                format!("Failed to summarize emails: {e}")
            }
        };
        Ok(ToolOutput::text(text, start.elapsed()))
    }
}
