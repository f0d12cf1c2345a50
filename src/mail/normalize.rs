//! Message normalization: reduce a multi-part, multiply-encoded message to
//! a flat `{sender, subject, date, body}` record.
//!
//! Normalization never fails. Anything that cannot be decoded degrades to
//! a diagnostic note embedded in the body placeholder, so callers always
//! get a record they can show to the model.
//!
//! Body selection walks the part tree in document order:
//! - attachments are skipped,
//! - the first `text/plain` part wins and ends the walk,
//! - the first `text/html` part is kept only until a plain part shows up,
//! - everything else (containers included) is skipped with a note.

use std::fmt;

use crate::error::MailError;
use crate::mail::charset;
use crate::mail::header::decode_encoded_words;
use crate::mail::message::{BodyPart, Disposition, Payload, RawMessage};

pub const NO_SUBJECT: &str = "(No Subject)";
pub const NO_SENDER: &str = "(No Sender)";
pub const NO_DATE: &str = "(No Date)";
pub const NO_BODY_CONTENT: &str = "(No body content)";
pub const NO_BODY_AVAILABLE: &str = "(No body content available)";

/// Which optional fields a caller wants in the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub include_date: bool,
    /// Append skip/error notes to the body placeholder.
    pub include_diagnostics: bool,
}

impl NormalizeOptions {
    /// Full record, as shown when retrieving mail.
    pub const RETRIEVAL: Self = Self {
        include_date: true,
        include_diagnostics: true,
    };

    /// Sender, subject and body only, as fed to the summarizer.
    pub const SUMMARY: Self = Self {
        include_date: false,
        include_diagnostics: false,
    };
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self::RETRIEVAL
    }
}

/// Flat view of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    pub sender: String,
    /// Never empty.
    pub subject: String,
    /// `Some` only when the date was requested.
    pub date: Option<String>,
    pub body: String,
}

impl NormalizedMessage {
    /// Render as the block shown to the model.
    pub fn render(&self) -> String {
        match &self.date {
            Some(date) => format!(
                "From: {}\nSubject: {}\nDate: {}\nBody: {}\n",
                self.sender, self.subject, date, self.body
            ),
            None => format!(
                "From: {}\nSubject: {}\nBody: {}\n",
                self.sender, self.subject, self.body
            ),
        }
    }
}

/// Why a part did not contribute to the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartNote {
    Attachment { content_type: String },
    NoPayload { content_type: String },
    NonText { content_type: String },
    DecodeFailed(MailError),
    SinglePartFailed { reason: String },
}

impl fmt::Display for PartNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attachment { content_type } => {
                write!(f, "Skipped part: {content_type} (attachment)")
            }
            Self::NoPayload { content_type } => {
                write!(f, "Skipped part: {content_type} (no payload)")
            }
            Self::NonText { content_type } => write!(f, "Skipped part: {content_type} (non-text)"),
            Self::DecodeFailed(e) => write!(f, "{e}"),
            Self::SinglePartFailed { reason } => write!(f, "Error decoding single-part: {reason}"),
        }
    }
}

/// Result of body selection before placeholders are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyExtraction {
    pub body: Option<String>,
    pub notes: Vec<PartNote>,
}

/// Normalize one message.
pub fn normalize(message: &RawMessage, options: NormalizeOptions) -> NormalizedMessage {
    let extraction = extract_body(&message.root);
    let has_body = extraction.body.as_deref().is_some_and(|b| !b.is_empty());

    let body = if has_body {
        extraction.body.unwrap_or_default()
    } else if options.include_diagnostics && !extraction.notes.is_empty() {
        let notes: Vec<String> = extraction.notes.iter().map(ToString::to_string).collect();
        format!("(No body content available. Debug: {})", notes.join("; "))
    } else {
        NO_BODY_AVAILABLE.to_string()
    };

    NormalizedMessage {
        sender: present(message.from.as_deref()).unwrap_or_else(|| NO_SENDER.to_string()),
        subject: decode_subject(message.subject.as_deref()),
        date: options
            .include_date
            .then(|| present(message.date.as_deref()).unwrap_or_else(|| NO_DATE.to_string())),
        body,
    }
}

fn present(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Decode a raw subject header, substituting the placeholder when the
/// header is missing or decodes to nothing.
pub fn decode_subject(raw: Option<&str>) -> String {
    match raw.filter(|s| !s.is_empty()) {
        Some(raw) => {
            let decoded = decode_encoded_words(raw);
            if decoded.is_empty() {
                NO_SUBJECT.to_string()
            } else {
                decoded
            }
        }
        None => NO_SUBJECT.to_string(),
    }
}

/// Choose the body text of a message and record why other parts were
/// passed over.
pub fn extract_body(root: &BodyPart) -> BodyExtraction {
    if root.is_multipart() {
        extract_multipart(root)
    } else {
        extract_single(root)
    }
}

fn extract_multipart(root: &BodyPart) -> BodyExtraction {
    let mut out = BodyExtraction::default();

    for part in root.walk() {
        let content_type = part.content_type.clone();

        if part.disposition == Disposition::Attachment {
            out.notes.push(PartNote::Attachment { content_type });
            continue;
        }

        let is_plain = content_type == "text/plain";
        if !is_plain && content_type != "text/html" {
            out.notes.push(PartNote::NonText { content_type });
            continue;
        }

        match decode_part(part) {
            Ok(Some(text)) if is_plain => {
                out.body = Some(text);
                break;
            }
            Ok(Some(text)) => {
                if out.body.is_none() {
                    out.body = Some(text);
                }
            }
            Ok(None) => out.notes.push(PartNote::NoPayload { content_type }),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping undecodable part");
                out.notes.push(PartNote::DecodeFailed(e));
            }
        }
    }

    out
}

fn extract_single(root: &BodyPart) -> BodyExtraction {
    let mut out = BodyExtraction::default();

    match &root.payload {
        Payload::Absent => out.body = Some(NO_BODY_CONTENT.to_string()),
        Payload::Bytes(bytes) if bytes.is_empty() => out.body = Some(NO_BODY_CONTENT.to_string()),
        Payload::Bytes(bytes) => match charset::decode_lossy(&root.charset, bytes) {
            Ok(text) => out.body = Some(text),
            Err(reason) => out.notes.push(PartNote::SinglePartFailed { reason }),
        },
        Payload::Undecodable(reason) => out.notes.push(PartNote::SinglePartFailed {
            reason: reason.clone(),
        }),
    }

    out
}

/// Decode one part's payload with its declared charset.
///
/// `Ok(None)` means the part has no payload of its own.
fn decode_part(part: &BodyPart) -> Result<Option<String>, MailError> {
    let failure = |reason: String| MailError::PartialDecodeFailure {
        part: part.content_type.clone(),
        reason,
    };

    match &part.payload {
        Payload::Absent => Ok(None),
        Payload::Undecodable(reason) => Err(failure(reason.clone())),
        Payload::Bytes(bytes) => charset::decode_lossy(&part.charset, bytes)
            .map(Some)
            .map_err(failure),
    }
}
