//! Recent-message retrieval.
//!
//! The store is reached through [`MailStore`] / [`MailSession`] so the
//! selection logic can run against an in-memory mailbox in tests. Every
//! call opens its own session; the session is closed (LOGOUT) when it is
//! dropped, on success and on error alike.

use crate::error::MailError;
use crate::mail::message::RawMessage;

/// An authenticated connection to a mailbox server.
pub trait MailSession {
    fn select(&mut self, mailbox: &str) -> Result<(), MailError>;

    /// Identifiers of every message in the selected mailbox, oldest first.
    fn search_all(&mut self) -> Result<Vec<String>, MailError>;

    /// Full RFC 822 bytes of one message.
    ///
    /// `Ok(None)` means the server declined this message only; the session
    /// stays usable. `Err` means the session itself failed.
    fn fetch_rfc822(&mut self, id: &str) -> Result<Option<Vec<u8>>, MailError>;
}

/// Something that can open sessions against a configured mailbox.
pub trait MailStore: Send + Sync {
    /// Connect and authenticate.
    fn open(&self) -> Result<Box<dyn MailSession + '_>, MailError>;

    /// Name of the mailbox to read from.
    fn mailbox(&self) -> &str;
}

/// How many of the newest messages to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSelection {
    pub requested: usize,
    pub available: usize,
    /// `min(requested, available)`.
    pub effective: usize,
}

impl FetchSelection {
    /// Negative requests are treated as zero.
    pub fn new(requested: i64, available: usize) -> Self {
        let requested = usize::try_from(requested).unwrap_or(0);
        Self {
            requested,
            available,
            effective: requested.min(available),
        }
    }

    /// The newest `effective` entries of an oldest-first list, still in
    /// ascending order.
    pub fn tail<'a, T>(&self, ids: &'a [T]) -> &'a [T] {
        let start = ids.len().saturating_sub(self.effective);
        &ids[start..]
    }
}

/// One slot of a retrieval result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchedMessage {
    Message { id: String, raw: RawMessage },
    /// The server refused this message; the rest of the batch continues.
    Failed { id: String },
}

impl FetchedMessage {
    pub fn id(&self) -> &str {
        match self {
            Self::Message { id, .. } | Self::Failed { id } => id,
        }
    }
}

/// Fetch the `requested` newest messages from the store, oldest first.
///
/// Blocking; call from `spawn_blocking`.
pub fn fetch_recent(store: &dyn MailStore, requested: i64) -> Result<Vec<FetchedMessage>, MailError> {
    if requested <= 0 {
        tracing::debug!(requested, "Nothing requested, skipping mailbox");
        return Ok(Vec::new());
    }

    let mut session = store.open()?;
    session.select(store.mailbox())?;
    let ids = session.search_all()?;

    let selection = FetchSelection::new(requested, ids.len());
    tracing::info!(
        mailbox = %store.mailbox(),
        requested = selection.requested,
        available = selection.available,
        effective = selection.effective,
        "Fetching recent messages"
    );

    let mut fetched = Vec::with_capacity(selection.effective);
    for id in selection.tail(&ids) {
        match session.fetch_rfc822(id)? {
            Some(bytes) => fetched.push(FetchedMessage::Message {
                id: id.clone(),
                raw: RawMessage::from_bytes(&bytes),
            }),
            None => {
                tracing::warn!(id = %id, "Message could not be fetched");
                fetched.push(FetchedMessage::Failed { id: id.clone() });
            }
        }
    }
    Ok(fetched)
}
