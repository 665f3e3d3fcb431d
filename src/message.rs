/*
 * message.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tagliacarte, a cross-platform email client.
 *
 * Tagliacarte is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tagliacarte is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tagliacarte.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Envelope types and the narrow `Message` capability SMTP submission
//! consumes. MIME construction and header parsing live in a sibling
//! library; this module only models what the wire protocol needs to see.

/// Email or display address, as either a mailbox or an RFC 2822 group
/// marker (`Group:;` with member addresses, `NIL` mailbox/host per IMAP
/// ENVELOPE encoding).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Mailbox { display_name: Option<String>, local_part: String, domain: Option<String> },
    Group { name: String, members: Vec<Address> },
}

impl Address {
    pub fn mailbox(local_part: impl Into<String>, domain: impl Into<String>) -> Self {
        Address::Mailbox { display_name: None, local_part: local_part.into(), domain: Some(domain.into()) }
    }

    /// Render as `user@host`, or `user` alone when the domain is absent
    /// (IMAP group markers and bare local parts).
    pub fn address_spec(&self) -> String {
        match self {
            Address::Mailbox { local_part, domain, .. } => match domain {
                Some(d) => format!("{}@{}", local_part, d),
                None => local_part.clone(),
            },
            Address::Group { name, .. } => format!("{}:;", name),
        }
    }
}

/// Date/time for a message envelope: Unix timestamp plus the zone offset
/// the originating `Date:` header carried, if known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeDateTime {
    pub timestamp: i64,
    pub tz_offset_secs: Option<i32>,
}

/// A message envelope: the 10 fields IMAP's ENVELOPE fetch item carries,
/// widened with `bcc`/`resent-*`/`sender` for SMTP submission, which
/// ENVELOPE does not expose but RFC 5322 requires for sending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub date: Option<EnvelopeDateTime>,
    pub subject: Option<String>,
    pub from: Vec<Address>,
    pub sender: Vec<Address>,
    pub reply_to: Vec<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub resent_from: Vec<Address>,
    pub resent_to: Vec<Address>,
    /// Normalized with surrounding angle brackets stripped; callers
    /// re-add `<...>` when building wire commands that need them.
    pub in_reply_to: Option<String>,
    pub message_id: Option<String>,
}

/// The envelope-addressing + serialization capability SMTP submission
/// consumes. MIME header enumeration and body bytes are produced by a
/// sibling library; this crate only needs enough to build `MAIL FROM`/
/// `RCPT TO` and to stream the RFC 5322 bytes for DATA/BDAT.
pub trait Message {
    fn from(&self) -> &[Address];
    fn sender(&self) -> &[Address];
    fn to(&self) -> &[Address];
    fn cc(&self) -> &[Address];
    fn bcc(&self) -> &[Address];
    fn resent_from(&self) -> &[Address];
    fn resent_to(&self) -> &[Address];

    /// All RFC 5322 header lines (name, value), in the order they should
    /// be written. Does not include the blank line separating headers
    /// from the body.
    fn headers(&self) -> Vec<(String, String)>;

    /// Stream the raw message body (not dot-stuffed, CRLF line endings)
    /// in chunks to `sink`.
    fn write_body(&self, sink: &mut dyn FnMut(&[u8]));

    /// All envelope recipients for `RCPT TO` purposes: `to` + `cc` + `bcc`.
    fn envelope_recipients(&self) -> Vec<Address> {
        let mut all = Vec::new();
        all.extend(self.to().iter().cloned());
        all.extend(self.cc().iter().cloned());
        all.extend(self.bcc().iter().cloned());
        all
    }

    /// The envelope sender for `MAIL FROM`: `sender` if present, else the
    /// first `from` address.
    fn envelope_sender(&self) -> Option<&Address> {
        self.sender().first().or_else(|| self.from().first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_spec_formats_mailbox() {
        let a = Address::mailbox("alice", "example.com");
        assert_eq!(a.address_spec(), "alice@example.com");
    }

    #[test]
    fn address_spec_formats_group_marker() {
        let g = Address::Group { name: "undisclosed-recipients".to_string(), members: vec![] };
        assert_eq!(g.address_spec(), "undisclosed-recipients:;");
    }
}
