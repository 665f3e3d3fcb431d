/*
 * secret_detector.rs
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

//! Per-protocol detection of credential bytes in a traced command stream,
//! for the protocol logger to redact before writing a trace line. A
//! detector scans one buffer at a time and reports `[start, length)`
//! byte intervals to overwrite; it tracks just enough state (an
//! authentication-in-progress flag) across calls to follow a multi-line
//! AUTH dialog, the same single-pass, position-tracking shape as
//! [`crate::smtp::dot_stuffer::DotStuffer`].

/// A half-open byte interval `[start, start + length)` to redact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedactedRange {
    pub start: usize,
    pub length: usize,
}

/// Scans lines of client (or server) traffic for secret-bearing bytes.
/// Implementations are stateful across calls within one connection's
/// lifetime: an `AUTH`/`USER`/`PASS` exchange spans several lines, and the
/// detector must remember it is mid-exchange to redact the continuation
/// lines that carry no command keyword of their own.
pub trait SecretDetector {
    /// Scan one line of client-to-server traffic (without its terminating
    /// CRLF) and return the redacted ranges within it, in order.
    fn scan_client_line(&mut self, line: &[u8]) -> Vec<RedactedRange>;

    /// Scan one line of server-to-client traffic. Most protocols never
    /// echo the secret back, so the default redacts nothing, but SMTP/POP3
    /// AUTH continuation dialogs are driven by server challenges and a
    /// detector may need to observe them to know when the exchange ends.
    fn scan_server_line(&mut self, _line: &[u8]) -> Vec<RedactedRange> {
        Vec::new()
    }
}

fn word_at(line: &[u8], index: usize) -> Option<(usize, usize)> {
    let words: Vec<(usize, usize)> = split_words(line);
    words.into_iter().nth(index)
}

/// Byte offsets of each whitespace-delimited word in `line`.
fn split_words(line: &[u8]) -> Vec<(usize, usize)> {
    let mut words = Vec::new();
    let mut i = 0;
    while i < line.len() {
        while i < line.len() && line[i] == b' ' {
            i += 1;
        }
        if i >= line.len() {
            break;
        }
        let start = i;
        while i < line.len() && line[i] != b' ' {
            i += 1;
        }
        words.push((start, i - start));
    }
    words
}

fn is_base64_like(line: &[u8]) -> bool {
    !line.is_empty()
        && line != b"."
        && line
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
}

/// POP3: redacts `USER arg`, `PASS arg`, both tokens of `APOP user digest`,
/// the initial-response argument of `AUTH mech [ir]`, and any standalone
/// base64 continuation line following `AUTH` up to the terminating status.
#[derive(Debug, Default)]
pub struct Pop3SecretDetector {
    in_auth_dialog: bool,
}

impl Pop3SecretDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretDetector for Pop3SecretDetector {
    fn scan_client_line(&mut self, line: &[u8]) -> Vec<RedactedRange> {
        if self.in_auth_dialog {
            if is_base64_like(line) {
                return vec![RedactedRange { start: 0, length: line.len() }];
            }
            self.in_auth_dialog = false;
        }

        let words = split_words(line);
        let Some(&(cmd_start, cmd_len)) = words.first() else { return Vec::new() };
        let cmd = line[cmd_start..cmd_start + cmd_len].to_ascii_uppercase();

        match cmd.as_slice() {
            b"USER" | b"PASS" => word_at(line, 1)
                .map(|(s, l)| vec![RedactedRange { start: s, length: l }])
                .unwrap_or_default(),
            b"APOP" => {
                let mut ranges = Vec::new();
                if let Some((s, l)) = word_at(line, 1) {
                    ranges.push(RedactedRange { start: s, length: l });
                }
                if let Some((s, l)) = word_at(line, 2) {
                    ranges.push(RedactedRange { start: s, length: l });
                }
                ranges
            }
            b"AUTH" => {
                self.in_auth_dialog = true;
                word_at(line, 2)
                    .map(|(s, l)| vec![RedactedRange { start: s, length: l }])
                    .unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }

    fn scan_server_line(&mut self, line: &[u8]) -> Vec<RedactedRange> {
        if self.in_auth_dialog && (line.starts_with(b"+OK") || line.starts_with(b"-ERR")) {
            self.in_auth_dialog = false;
        }
        Vec::new()
    }
}

/// SMTP: redacts the initial-response argument of `AUTH mech [ir]` and any
/// standalone base64 response line up to the closing `2xx`/`5xx` reply.
#[derive(Debug, Default)]
pub struct SmtpSecretDetector {
    in_auth_dialog: bool,
}

impl SmtpSecretDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretDetector for SmtpSecretDetector {
    fn scan_client_line(&mut self, line: &[u8]) -> Vec<RedactedRange> {
        if self.in_auth_dialog {
            if is_base64_like(line) {
                return vec![RedactedRange { start: 0, length: line.len() }];
            }
            self.in_auth_dialog = false;
        }

        let words = split_words(line);
        let Some(&(cmd_start, cmd_len)) = words.first() else { return Vec::new() };
        let cmd = line[cmd_start..cmd_start + cmd_len].to_ascii_uppercase();
        if cmd == b"AUTH" {
            self.in_auth_dialog = true;
            return word_at(line, 2)
                .map(|(s, l)| vec![RedactedRange { start: s, length: l }])
                .unwrap_or_default();
        }
        Vec::new()
    }

    fn scan_server_line(&mut self, line: &[u8]) -> Vec<RedactedRange> {
        if self.in_auth_dialog && line.len() >= 3 {
            if let Ok(code) = std::str::from_utf8(&line[..3]).unwrap_or("").parse::<u16>() {
                if code < 300 || code >= 500 {
                    self.in_auth_dialog = false;
                }
            }
        }
        Vec::new()
    }
}

/// IMAP: redacts both arguments of `tag LOGIN user pass` and the whole of
/// any `AUTHENTICATE` continuation line.
#[derive(Debug, Default)]
pub struct ImapSecretDetector {
    in_auth_dialog: bool,
}

impl ImapSecretDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretDetector for ImapSecretDetector {
    fn scan_client_line(&mut self, line: &[u8]) -> Vec<RedactedRange> {
        if self.in_auth_dialog {
            return vec![RedactedRange { start: 0, length: line.len() }];
        }

        let words = split_words(line);
        // Tagged command: `A1 LOGIN user pass` — LOGIN is the second word.
        if let Some(&(cmd_start, cmd_len)) = words.get(1) {
            let cmd = line[cmd_start..cmd_start + cmd_len].to_ascii_uppercase();
            if cmd == b"LOGIN" {
                let mut ranges = Vec::new();
                if let Some((s, l)) = words.get(2).copied() {
                    ranges.push(RedactedRange { start: s, length: l });
                }
                if let Some((s, l)) = words.get(3).copied() {
                    ranges.push(RedactedRange { start: s, length: l });
                }
                return ranges;
            }
            if cmd == b"AUTHENTICATE" {
                self.in_auth_dialog = true;
            }
        }
        Vec::new()
    }

    fn scan_server_line(&mut self, line: &[u8]) -> Vec<RedactedRange> {
        if self.in_auth_dialog && !line.starts_with(b"+") {
            self.in_auth_dialog = false;
        }
        Vec::new()
    }
}

/// Overwrite each redacted range in `line` with `mask`, repeated to fill
/// the interval's length.
pub fn apply_redactions(line: &[u8], ranges: &[RedactedRange], mask: &str) -> Vec<u8> {
    let mut out = line.to_vec();
    let mask_bytes = mask.as_bytes();
    for range in ranges {
        let end = (range.start + range.length).min(out.len());
        for (offset, i) in (range.start..end).enumerate() {
            out[i] = mask_bytes[offset % mask_bytes.len().max(1)];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop3_redacts_user_and_pass() {
        let mut d = Pop3SecretDetector::new();
        let r = d.scan_client_line(b"USER alice");
        assert_eq!(r, vec![RedactedRange { start: 5, length: 5 }]);
        let r = d.scan_client_line(b"PASS hunter2");
        assert_eq!(r, vec![RedactedRange { start: 5, length: 7 }]);
    }

    #[test]
    fn pop3_redacts_apop_both_tokens() {
        let mut d = Pop3SecretDetector::new();
        let r = d.scan_client_line(b"APOP alice c4c9334bac560ecc979e58001b3e22fb");
        assert_eq!(r.len(), 2);
        assert_eq!(r[0], RedactedRange { start: 5, length: 5 });
    }

    #[test]
    fn pop3_auth_dialog_redacts_initial_response_and_continuation() {
        let mut d = Pop3SecretDetector::new();
        let r = d.scan_client_line(b"AUTH PLAIN AGFsaWNlAHB3AA==");
        assert_eq!(r, vec![RedactedRange { start: 11, length: 16 }]);
        // A standalone base64 continuation line is fully redacted.
        let r = d.scan_client_line(b"c2VzYW1l");
        assert_eq!(r, vec![RedactedRange { start: 0, length: 8 }]);
        d.scan_server_line(b"+OK");
        // Normal commands after the dialog closes are not redacted.
        let r = d.scan_client_line(b"QUIT");
        assert!(r.is_empty());
    }

    #[test]
    fn smtp_auth_dialog_closes_on_terminal_code() {
        let mut d = SmtpSecretDetector::new();
        let r = d.scan_client_line(b"AUTH LOGIN");
        assert!(r.is_empty());
        let r = d.scan_client_line(b"YWxpY2U=");
        assert_eq!(r, vec![RedactedRange { start: 0, length: 8 }]);
        d.scan_server_line(b"235 2.7.0 Authentication successful");
        let r = d.scan_client_line(b"MAIL FROM:<a@b>");
        assert!(r.is_empty());
    }

    #[test]
    fn imap_login_redacts_both_args() {
        let mut d = ImapSecretDetector::new();
        let r = d.scan_client_line(b"A1 LOGIN alice hunter2");
        assert_eq!(r, vec![RedactedRange { start: 9, length: 5 }, RedactedRange { start: 15, length: 7 }]);
    }

    #[test]
    fn imap_authenticate_redacts_continuation_lines() {
        let mut d = ImapSecretDetector::new();
        let r = d.scan_client_line(b"A2 AUTHENTICATE PLAIN");
        assert!(r.is_empty());
        let r = d.scan_client_line(b"AGFsaWNlAHB3AA==");
        assert_eq!(r, vec![RedactedRange { start: 0, length: 16 }]);
    }

    #[test]
    fn word_boundaries_are_stable_regardless_of_surrounding_whitespace() {
        // Detection offsets point into whatever buffer was actually
        // scanned; a caller handing the detector the same line framed
        // differently (no trailing content either way) still gets the
        // same interval relative to that buffer's start.
        let mut a = Pop3SecretDetector::new();
        let mut b = Pop3SecretDetector::new();
        assert_eq!(a.scan_client_line(b"USER alice"), b.scan_client_line(b"USER alice"));
    }

    #[test]
    fn apply_redactions_overwrites_with_mask() {
        let masked = apply_redactions(b"USER alice", &[RedactedRange { start: 5, length: 5 }], "*");
        assert_eq!(&masked, b"USER *****");
    }
}
