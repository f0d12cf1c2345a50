//! Structural view of a fetched message: headers plus a tree of body parts.

use mailparse::{MailHeaderMap, ParsedMail};

use crate::mail::charset::DEFAULT_CHARSET;
use crate::mail::header::unfold;

/// How a part is presented to the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
    Unknown,
}

impl Disposition {
    /// Classify a raw `Content-Disposition` header value.
    ///
    /// Any mention of `attachment` wins, so malformed values such as
    /// `inline; attachment` still keep the part out of the body.
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::Unknown;
        };
        let lower = value.to_ascii_lowercase();
        if lower.contains("attachment") {
            Self::Attachment
        } else if lower.trim_start().starts_with("inline") {
            Self::Inline
        } else {
            Self::Unknown
        }
    }
}

/// Transfer-decoded content of a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Containers carry no payload of their own.
    Absent,
    Bytes(Vec<u8>),
    /// The transfer encoding could not be undone.
    Undecodable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    /// Lowercased MIME type, e.g. `text/plain`.
    pub content_type: String,
    pub disposition: Disposition,
    /// Declared charset, `utf-8` when the part does not name one.
    pub charset: String,
    pub payload: Payload,
    pub children: Vec<BodyPart>,
}

impl BodyPart {
    pub fn leaf(content_type: &str, charset: &str, payload: Payload) -> Self {
        Self {
            content_type: content_type.to_ascii_lowercase(),
            disposition: Disposition::Unknown,
            charset: charset.to_string(),
            payload,
            children: Vec::new(),
        }
    }

    pub fn text(content_type: &str, body: &str) -> Self {
        Self::leaf(
            content_type,
            DEFAULT_CHARSET,
            Payload::Bytes(body.as_bytes().to_vec()),
        )
    }

    pub fn container(content_type: &str, children: Vec<BodyPart>) -> Self {
        Self {
            content_type: content_type.to_ascii_lowercase(),
            disposition: Disposition::Unknown,
            charset: DEFAULT_CHARSET.to_string(),
            payload: Payload::Absent,
            children,
        }
    }

    pub fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = disposition;
        self
    }

    /// A multipart part that kept its raw payload (no usable boundary)
    /// counts as single-part.
    pub fn is_multipart(&self) -> bool {
        !self.children.is_empty()
            || (self.content_type.starts_with("multipart/")
                && matches!(self.payload, Payload::Absent))
    }

    /// Pre-order traversal: this part first, then each child's subtree in
    /// document order.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

/// Iterator returned by [`BodyPart::walk`].
pub struct Walk<'a> {
    stack: Vec<&'a BodyPart>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a BodyPart;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        self.stack.extend(part.children.iter().rev());
        Some(part)
    }
}

/// A message as fetched from the store, reduced to what normalization reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Raw `Subject` value, still RFC 2047 encoded.
    pub subject: Option<String>,
    pub from: Option<String>,
    pub date: Option<String>,
    pub root: BodyPart,
}

impl RawMessage {
    pub fn new(root: BodyPart) -> Self {
        Self {
            subject: None,
            from: None,
            date: None,
            root,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Parse RFC 5322 bytes.
    ///
    /// Never fails: if the MIME structure cannot be parsed at all, the
    /// result is a single part whose payload records the parse error.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match mailparse::parse_mail(bytes) {
            Ok(parsed) => Self {
                subject: raw_header(&parsed, "Subject"),
                from: raw_header(&parsed, "From"),
                date: raw_header(&parsed, "Date"),
                root: convert_part(&parsed),
            },
            Err(e) => {
                tracing::debug!(error = %e, "Message structure could not be parsed");
                Self::new(BodyPart::leaf(
                    "text/plain",
                    DEFAULT_CHARSET,
                    Payload::Undecodable(e.to_string()),
                ))
            }
        }
    }
}

fn raw_header(parsed: &ParsedMail<'_>, key: &str) -> Option<String> {
    parsed
        .headers
        .get_first_header(key)
        .map(|h| unfold(&String::from_utf8_lossy(h.get_value_raw())))
}

fn convert_part(part: &ParsedMail<'_>) -> BodyPart {
    let content_type = part.ctype.mimetype.to_ascii_lowercase();
    let charset = part
        .ctype
        .params
        .get("charset")
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CHARSET.to_string());
    let disposition_header = part.headers.get_first_value("Content-Disposition");
    let disposition = Disposition::from_header(disposition_header.as_deref());

    if content_type.starts_with("multipart/") && !part.subparts.is_empty() {
        return BodyPart {
            content_type,
            disposition,
            charset,
            payload: Payload::Absent,
            children: part.subparts.iter().map(convert_part).collect(),
        };
    }

    if content_type == "message/rfc822" {
        // The enclosed message is walked like any other subtree.
        let children = match part.get_body_raw() {
            Ok(inner) => match mailparse::parse_mail(&inner) {
                Ok(parsed) => vec![convert_part(&parsed)],
                Err(_) => Vec::new(),
            },
            Err(_) => Vec::new(),
        };
        return BodyPart {
            content_type,
            disposition,
            charset,
            payload: Payload::Absent,
            children,
        };
    }

    let payload = match part.get_body_raw() {
        Ok(bytes) => Payload::Bytes(bytes),
        Err(e) => Payload::Undecodable(e.to_string()),
    };

    BodyPart {
        content_type,
        disposition,
        charset,
        payload,
        children: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_classification() {
        assert_eq!(Disposition::from_header(None), Disposition::Unknown);
        assert_eq!(
            Disposition::from_header(Some("attachment; filename=\"a.pdf\"")),
            Disposition::Attachment
        );
        assert_eq!(
            Disposition::from_header(Some("ATTACHMENT")),
            Disposition::Attachment
        );
        assert_eq!(Disposition::from_header(Some("inline")), Disposition::Inline);
        assert_eq!(Disposition::from_header(Some("form-data")), Disposition::Unknown);
    }

    #[test]
    fn walk_is_preorder_document_order() {
        let tree = BodyPart::container(
            "multipart/mixed",
            vec![
                BodyPart::container(
                    "multipart/alternative",
                    vec![
                        BodyPart::text("text/plain", "a"),
                        BodyPart::text("text/html", "b"),
                    ],
                ),
                BodyPart::leaf("image/png", "utf-8", Payload::Bytes(vec![0x89])),
            ],
        );
        let order: Vec<&str> = tree.walk().map(|p| p.content_type.as_str()).collect();
        assert_eq!(
            order,
            vec![
                "multipart/mixed",
                "multipart/alternative",
                "text/plain",
                "text/html",
                "image/png",
            ]
        );
    }

    #[test]
    fn parses_single_part_with_charset() {
        let raw = b"From: Alice <alice@example.com>\r\n\
Subject: =?utf-8?q?Caf=C3=A9?=\r\n\
Date: Mon, 6 Jan 2025 10:00:00 +0000\r\n\
Content-Type: text/plain; charset=\"ISO-8859-1\"\r\n\
\r\n\
Caf\xe9\r\n";
        let msg = RawMessage::from_bytes(raw);
        assert_eq!(msg.from.as_deref(), Some("Alice <alice@example.com>"));
        assert_eq!(msg.subject.as_deref(), Some("=?utf-8?q?Caf=C3=A9?="));
        assert_eq!(msg.date.as_deref(), Some("Mon, 6 Jan 2025 10:00:00 +0000"));
        assert!(!msg.root.is_multipart());
        assert_eq!(msg.root.content_type, "text/plain");
        assert!(msg.root.charset.eq_ignore_ascii_case("iso-8859-1"));
        match &msg.root.payload {
            Payload::Bytes(b) => assert!(b.starts_with(b"Caf\xe9")),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn missing_charset_defaults_to_utf8() {
        let raw = b"Subject: hi\r\nContent-Type: text/plain\r\n\r\nbody\r\n";
        let msg = RawMessage::from_bytes(raw);
        assert_eq!(msg.root.charset, "utf-8");
        assert!(msg.from.is_none());
        assert!(msg.date.is_none());
    }

    #[test]
    fn parses_multipart_tree() {
        let raw = b"Subject: parts\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
--outer\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Hi</p>\r\n\
--outer\r\n\
Content-Type: application/pdf\r\n\
Content-Disposition: attachment; filename=\"r.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0=\r\n\
--outer--\r\n";
        let msg = RawMessage::from_bytes(raw);
        assert!(msg.root.is_multipart());
        assert_eq!(msg.root.payload, Payload::Absent);
        assert_eq!(msg.root.children.len(), 2);
        assert_eq!(msg.root.children[0].content_type, "text/html");
        assert_eq!(msg.root.children[1].content_type, "application/pdf");
        assert_eq!(msg.root.children[1].disposition, Disposition::Attachment);
        assert_eq!(
            msg.root.children[1].payload,
            Payload::Bytes(b"%PDF-".to_vec())
        );
    }
}
