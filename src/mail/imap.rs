//! Minimal IMAP4rev1 client over TLS (blocking; run in `spawn_blocking`).
//!
//! Speaks just enough of the protocol for retrieval: greeting, LOGIN,
//! SELECT, SEARCH ALL, FETCH RFC822 and LOGOUT. Server literals
//! (`{n}\r\n` followed by n raw bytes) are read exactly, so message bodies
//! keep their original bytes.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;

use rustls_pki_types::ServerName;
use secrecy::ExposeSecret;

use crate::config::MailConfig;
use crate::error::MailError;
use crate::mail::fetch::{MailSession, MailStore};

/// Upper bound on a single literal; anything larger is treated as a
/// protocol error rather than allocated.
const MAX_LITERAL_BYTES: usize = 64 * 1024 * 1024;

pub type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Completion status of a tagged command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    No,
    Bad,
}

/// One untagged (`* ...`) response, with any literals it carried.
#[derive(Debug, Clone, Default)]
pub struct Untagged {
    pub line: String,
    pub literals: Vec<Vec<u8>>,
}

/// Everything the server sent for one command.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: Status,
    pub text: String,
    pub untagged: Vec<Untagged>,
}

/// An IMAP session over any byte stream.
pub struct ImapSession<S: Read + Write> {
    stream: BufReader<S>,
    next_tag: u32,
    logged_out: bool,
}

impl ImapSession<TlsStream> {
    /// Open a TLS connection and read the server greeting.
    pub fn connect(config: &MailConfig) -> Result<Self, MailError> {
        let tls = connect_tls(&config.imap_host, config.imap_port, config)?;
        tracing::debug!(host = %config.imap_host, port = config.imap_port, "IMAP connected");
        Self::from_stream(tls)
    }
}

impl<S: Read + Write> ImapSession<S> {
    /// Wrap an established stream and consume the greeting.
    pub fn from_stream(stream: S) -> Result<Self, MailError> {
        let mut session = Self {
            stream: BufReader::new(stream),
            next_tag: 1,
            logged_out: false,
        };
        let greeting = session.read_line()?;
        if greeting.starts_with("* BYE") {
            session.logged_out = true;
            return Err(MailError::transport(format!(
                "IMAP server refused connection: {}",
                greeting.trim_end()
            )));
        }
        if !greeting.starts_with("* OK") && !greeting.starts_with("* PREAUTH") {
            return Err(MailError::transport(format!(
                "Unexpected IMAP greeting: {}",
                greeting.trim_end()
            )));
        }
        Ok(session)
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<(), MailError> {
        let resp = self.command(&format!("LOGIN {} {}", quote(username), quote(password)))?;
        match resp.status {
            Status::Ok => {
                tracing::debug!(user = %username, "IMAP login succeeded");
                Ok(())
            }
            _ => Err(MailError::AuthFailure(resp.text)),
        }
    }

    /// Ask the server to end the session. Errors are ignored.
    pub fn logout(&mut self) {
        if self.logged_out {
            return;
        }
        self.logged_out = true;
        if let Err(e) = self.command("LOGOUT") {
            tracing::debug!(error = %e, "IMAP logout failed");
        }
    }

    /// Send one command and collect the response up to its tagged status.
    pub fn command(&mut self, command: &str) -> Result<Response, MailError> {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;

        let writer = self.stream.get_mut();
        writer.write_all(format!("{tag} {command}\r\n").as_bytes())?;
        writer.flush()?;

        let tag_prefix = format!("{tag} ");
        let mut untagged = Vec::new();

        loop {
            let line = self.read_line()?;
            if let Some(rest) = line.strip_prefix(&tag_prefix) {
                let rest = rest.trim_end();
                let (word, text) = rest.split_once(' ').unwrap_or((rest, ""));
                let status = match word.to_ascii_uppercase().as_str() {
                    "OK" => Status::Ok,
                    "NO" => Status::No,
                    _ => Status::Bad,
                };
                return Ok(Response {
                    status,
                    text: text.to_string(),
                    untagged,
                });
            }

            if line.starts_with('+') {
                // Continuation request; we never send literals.
                continue;
            }

            untagged.push(self.read_untagged(line)?);
        }
    }

    fn read_untagged(&mut self, first_line: String) -> Result<Untagged, MailError> {
        let mut item = Untagged::default();
        let mut line = first_line;

        loop {
            let trimmed = line.trim_end_matches(['\r', '\n']);
            match literal_len(trimmed) {
                Some(len) => {
                    if len > MAX_LITERAL_BYTES {
                        return Err(MailError::transport(format!(
                            "IMAP literal of {len} bytes exceeds limit"
                        )));
                    }
                    item.line.push_str(trimmed);
                    let mut literal = vec![0u8; len];
                    self.stream.read_exact(&mut literal)?;
                    item.literals.push(literal);
                    line = self.read_line()?;
                }
                None => {
                    item.line.push_str(trimmed);
                    return Ok(item);
                }
            }
        }
    }

    fn read_line(&mut self) -> Result<String, MailError> {
        let mut buf = Vec::new();
        let n = self.stream.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Err(MailError::transport("IMAP connection closed"));
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl<S: Read + Write> MailSession for ImapSession<S> {
    fn select(&mut self, mailbox: &str) -> Result<(), MailError> {
        let resp = self.command(&format!("SELECT {}", quote(mailbox)))?;
        match resp.status {
            Status::Ok => Ok(()),
            _ => Err(MailError::NotFound(format!("Mailbox {mailbox}"))),
        }
    }

    fn search_all(&mut self) -> Result<Vec<String>, MailError> {
        let resp = self.command("SEARCH ALL")?;
        if resp.status != Status::Ok {
            tracing::warn!(status = ?resp.status, text = %resp.text, "IMAP search failed");
            return Err(MailError::transport("Unable to search inbox"));
        }
        Ok(resp
            .untagged
            .iter()
            .filter_map(|u| {
                let rest = u.line.strip_prefix("* ")?;
                let (word, ids) = rest.split_once(' ').unwrap_or((rest, ""));
                word.eq_ignore_ascii_case("SEARCH").then_some(ids)
            })
            .flat_map(|ids| ids.split_whitespace().map(str::to_string))
            .collect())
    }

    fn fetch_rfc822(&mut self, id: &str) -> Result<Option<Vec<u8>>, MailError> {
        let resp = self.command(&format!("FETCH {id} (RFC822)"))?;
        if resp.status != Status::Ok {
            tracing::warn!(id, status = ?resp.status, text = %resp.text, "IMAP fetch refused");
            return Ok(None);
        }
        Ok(resp
            .untagged
            .into_iter()
            .filter(|u| u.line.to_ascii_uppercase().contains("FETCH"))
            .find_map(|u| u.literals.into_iter().next()))
    }
}

impl<S: Read + Write> Drop for ImapSession<S> {
    fn drop(&mut self) {
        self.logout();
    }
}

/// The configured mailbox server, opened fresh for every call.
pub struct ImapStore {
    config: Arc<MailConfig>,
}

impl ImapStore {
    pub fn new(config: Arc<MailConfig>) -> Self {
        Self { config }
    }
}

impl MailStore for ImapStore {
    fn open(&self) -> Result<Box<dyn MailSession + '_>, MailError> {
        let mut session = ImapSession::connect(&self.config)?;
        session.login(&self.config.username, self.config.password.expose_secret())?;
        Ok(Box::new(session))
    }

    fn mailbox(&self) -> &str {
        &self.config.mailbox
    }
}

/// Parse a trailing `{n}` or `{n+}` literal marker.
fn literal_len(line: &str) -> Option<usize> {
    let inner = line.strip_suffix('}')?;
    let open = inner.rfind('{')?;
    inner[open + 1..].trim_end_matches('+').parse().ok()
}

/// Render an IMAP quoted string.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn connect_tls(host: &str, port: u16, config: &MailConfig) -> Result<TlsStream, MailError> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| MailError::transport(format!("Cannot resolve {host}: {e}")))?;

    let mut last_err = None;
    let mut tcp = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, config.timeout) {
            Ok(stream) => {
                tcp = Some(stream);
                break;
            }
            Err(e) => last_err = Some(e),
        }
    }
    let tcp = match (tcp, last_err) {
        (Some(tcp), _) => tcp,
        (None, Some(e)) => return Err(MailError::transport(format!("Cannot connect to {host}:{port}: {e}"))),
        (None, None) => return Err(MailError::transport(format!("No address found for {host}"))),
    };
    tcp.set_read_timeout(Some(config.timeout))?;
    tcp.set_write_timeout(Some(config.timeout))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(MailError::transport)?
    .with_root_certificates(root_store)
    .with_no_client_auth();

    let server_name = ServerName::try_from(host.to_string()).map_err(MailError::transport)?;
    let conn = rustls::ClientConnection::new(Arc::new(tls_config), server_name)
        .map_err(MailError::transport)?;

    Ok(rustls::StreamOwned::new(conn, tcp))
}
