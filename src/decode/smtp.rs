/*
 * smtp.rs
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

//! ESMTP three-digit response decoding. A continuation line is `NNN-text`;
//! the final line is `NNN text` or bare `NNN`. The code must match on every
//! line of one response.

use super::line::LineBuffer;
use crate::error::ProtocolError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpResponse {
    pub code: u16,
    /// One entry per line, continuation marker stripped.
    pub lines: Vec<String>,
}

impl SmtpResponse {
    pub fn message(&self) -> String {
        self.lines.join(" ")
    }

    pub fn is_success(&self) -> bool {
        self.code < 400
    }

    pub fn is_transient(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_permanent(&self) -> bool {
        self.code >= 500
    }
}

#[derive(Default)]
pub struct SmtpResponseDecoder {
    lines: LineBuffer,
    code: Option<u16>,
    collected: Vec<String>,
}

impl SmtpResponseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.lines.push(bytes);
    }

    /// Pop the next complete response, if all of its lines have arrived.
    /// Returns `Ok(None)` when more bytes are needed, and an error if a
    /// continuation line's code does not match the response's first code.
    pub fn poll(&mut self) -> Result<Option<SmtpResponse>, ProtocolError> {
        loop {
            let Some(raw) = self.lines.pop_line() else { return Ok(None) };
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if line.len() < 3 {
                return Err(ProtocolError::bad_response(format!("line too short for a code: {:?}", line)));
            }
            let code: u16 = line[..3]
                .parse()
                .map_err(|_| ProtocolError::bad_response(format!("non-numeric response code: {:?}", line)))?;
            match self.code {
                Some(first_code) if first_code != code => {
                    return Err(ProtocolError::bad_response(format!(
                        "response code changed mid-reply: {} then {}",
                        first_code, code
                    )));
                }
                None => self.code = Some(code),
                _ => {}
            }
            let continuation = line.as_bytes().get(3) == Some(&b'-');
            let text = if line.len() > 4 { line[4..].to_string() } else { String::new() };
            self.collected.push(text);
            if !continuation {
                let code = self.code.take().expect("code set above");
                let lines = std::mem::take(&mut self.collected);
                return Ok(Some(SmtpResponse { code, lines }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiline_ehlo_scenario() {
        let mut d = SmtpResponseDecoder::new();
        d.push(b"250-mail.example.com Hello\r\n250-SIZE 35882577\r\n250 PIPELINING\r\n");
        let resp = d.poll().unwrap().unwrap();
        assert_eq!(resp.code, 250);
        assert_eq!(resp.lines, vec!["mail.example.com Hello", "SIZE 35882577", "PIPELINING"]);
    }

    #[test]
    fn single_line_reply() {
        let mut d = SmtpResponseDecoder::new();
        d.push(b"354 Start mail input\r\n");
        let resp = d.poll().unwrap().unwrap();
        assert_eq!(resp.code, 354);
        assert_eq!(resp.lines, vec!["Start mail input"]);
    }

    #[test]
    fn mismatched_code_is_bad_response() {
        let mut d = SmtpResponseDecoder::new();
        d.push(b"250-a\r\n251 b\r\n");
        assert!(d.poll().is_err());
    }

    #[test]
    fn split_across_chunks() {
        let mut d = SmtpResponseDecoder::new();
        d.push(b"250-a\r");
        assert_eq!(d.poll().unwrap(), None);
        d.push(b"\n250 b\r\n");
        let resp = d.poll().unwrap().unwrap();
        assert_eq!(resp.lines, vec!["a", "b"]);
    }
}
