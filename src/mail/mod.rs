//! Mailbox access: retrieval over IMAP, delivery over SMTP, and the
//! normalizer that turns fetched MIME messages into plain text records.

pub mod charset;
pub mod fetch;
pub mod header;
pub mod imap;
pub mod message;
pub mod normalize;
pub mod smtp;
pub mod summarize;

pub use fetch::{FetchSelection, FetchedMessage, MailSession, MailStore, fetch_recent};
pub use imap::ImapStore;
pub use message::{BodyPart, Disposition, Payload, RawMessage};
pub use normalize::{NormalizeOptions, NormalizedMessage, normalize};
pub use smtp::{MailSender, OutgoingEmail, SmtpSender};
pub use summarize::Summarizer;
