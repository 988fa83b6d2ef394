use mailparse::{MailHeaderMap, ParsedMail};

use super::PollError;

/// A fetched message, decoded once and never mutated.
#[derive(Debug, Clone)]
pub struct Message {
    /// Diagnostic only; `None` when the header is absent or undecodable.
    pub subject: Option<String>,
    pub body: String,
    pub multipart: bool,
}

impl Message {
    /// Decode raw RFC 822 bytes.
    ///
    /// For multipart messages the body is the first `text/plain` or
    /// `text/html` part in depth-first order. A message without such a part,
    /// or with an empty body, is malformed.
    pub fn parse(raw: &[u8]) -> Result<Self, PollError> {
        let parsed = mailparse::parse_mail(raw).map_err(|e| {
            PollError::MalformedMessage(format!("failed to parse MIME message: {e}"))
        })?;

        let subject = match decode_subject(&parsed) {
            Ok(subject) => Some(subject),
            Err(reason) => {
                tracing::warn!("Could not decode subject: {}", reason);
                None
            }
        };

        let multipart = is_multipart(&parsed);
        let body_part = if multipart {
            first_text_part(&parsed).ok_or_else(|| {
                PollError::MalformedMessage("no text/plain or text/html part".to_string())
            })?
        } else {
            &parsed
        };

        let body = body_part
            .get_body()
            .map_err(|e| PollError::MalformedMessage(format!("failed to decode body: {e}")))?;
        if body.trim().is_empty() {
            return Err(PollError::MalformedMessage("message body is empty".to_string()));
        }

        Ok(Self {
            subject,
            body,
            multipart,
        })
    }
}

fn decode_subject(parsed: &ParsedMail<'_>) -> Result<String, String> {
    // get_first_value performs RFC 2047 decoding.
    parsed
        .get_headers()
        .get_first_value("Subject")
        .ok_or_else(|| "no Subject header".to_string())
}

fn is_multipart(parsed: &ParsedMail<'_>) -> bool {
    parsed
        .ctype
        .mimetype
        .to_ascii_lowercase()
        .starts_with("multipart/")
        || !parsed.subparts.is_empty()
}

fn is_text_body(part: &ParsedMail<'_>) -> bool {
    matches!(
        part.ctype.mimetype.to_ascii_lowercase().as_str(),
        "text/plain" | "text/html"
    )
}

fn first_text_part<'a, 'b>(part: &'a ParsedMail<'b>) -> Option<&'a ParsedMail<'b>> {
    for sub in &part.subparts {
        if is_text_body(sub) {
            return Some(sub);
        }
        if let Some(found) = first_text_part(sub) {
            return Some(found);
        }
    }
    None
}
