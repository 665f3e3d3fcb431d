/*
 * capabilities.rs
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

//! Case-insensitive capability token sets shared by IMAP, POP3 and SMTP.
//! A token is either bare (`PIPELINING`) or carries a value after `=`
//! (`AUTH=PLAIN LOGIN`, `SIZE=35882577`).

use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    tokens: HashMap<String, Option<String>>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str) -> String {
        name.to_ascii_uppercase()
    }

    pub fn insert(&mut self, name: &str, value: Option<String>) {
        self.tokens.insert(Self::key(name), value);
    }

    pub fn has(&self, name: &str) -> bool {
        self.tokens.contains_key(&Self::key(name))
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.tokens.get(&Self::key(name)).and_then(|v| v.as_deref())
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Parse a space-separated capability-token line body, e.g. the text
    /// following `* CAPABILITY`, the bracketed `[CAPABILITY ...]` response
    /// code's contents, or an SMTP EHLO `AUTH PLAIN LOGIN` continuation
    /// line's remainder. Each token is split on the first `=` if present.
    pub fn parse_tokens(line: &str) -> Self {
        let mut set = Self::new();
        for word in line.split_whitespace() {
            match word.split_once('=') {
                Some((name, value)) => set.insert(name, Some(value.to_string())),
                None => set.insert(word, None),
            }
        }
        set
    }

    /// AUTH=MECH tokens (IMAP-style) collapsed to a plain mechanism-name list.
    pub fn imap_auth_mechanisms(&self) -> Vec<String> {
        self.tokens
            .keys()
            .filter_map(|k| k.strip_prefix("AUTH="))
            .map(|s| s.to_string())
            .collect()
    }

    /// SMTP-style `AUTH PLAIN LOGIN` capability's mechanism list (the value
    /// is the whole space-separated remainder, stored under key "AUTH").
    pub fn smtp_auth_mechanisms(&self) -> Vec<String> {
        self.value("AUTH")
            .map(|v| v.split_whitespace().map(|s| s.to_ascii_uppercase()).collect())
            .unwrap_or_default()
    }
}

pub type ImapCapabilities = CapabilitySet;
pub type SmtpCapabilities = CapabilitySet;
pub type Pop3Capabilities = CapabilitySet;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_and_valued_tokens() {
        let caps = CapabilitySet::parse_tokens("IMAP4rev1 STARTTLS AUTH=PLAIN AUTH=LOGIN IDLE");
        assert!(caps.has("starttls"));
        assert!(caps.has("IDLE"));
        assert_eq!(caps.value("AUTH=PLAIN"), None);
        let mut mechs = caps.imap_auth_mechanisms();
        mechs.sort();
        assert_eq!(mechs, vec!["LOGIN".to_string(), "PLAIN".to_string()]);
    }

    #[test]
    fn smtp_size_value() {
        let caps = CapabilitySet::parse_tokens("SIZE=35882577");
        assert_eq!(caps.value("size"), Some("35882577"));
    }

    #[test]
    fn smtp_auth_line_is_space_separated_value() {
        let mut caps = CapabilitySet::new();
        caps.insert("AUTH", Some("PLAIN LOGIN CRAM-MD5".to_string()));
        assert_eq!(caps.smtp_auth_mechanisms(), vec!["PLAIN", "LOGIN", "CRAM-MD5"]);
    }
}
