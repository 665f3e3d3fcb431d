/*
 * value.rs
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

//! Generic tokenizer for IMAP's parenthesized token streams: FETCH
//! attribute lists, ENVELOPE, BODYSTRUCTURE, STATUS items and friends all
//! share this grammar — atom, quoted string, NIL, parenthesized group, or
//! a `{N}` literal placeholder resolved against an already-collected
//! payload list (`ImapLiteralMessage::payloads`).
//!
//! The payload cursor advances monotonically in lockstep with each `{N}`
//! placeholder encountered, per the design note in `spec.md` §9: the
//! decoder hands the parser a flat `{ line, payloads }` pair rather than
//! splicing literal bytes into the line itself.

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Atom(String),
    QuotedString(String),
    /// A resolved literal payload, binary-safe.
    Literal(Vec<u8>),
    List(Vec<Value>),
}

impl Value {
    /// View the value as text, whichever of Atom/QuotedString/Literal it
    /// is. Literal bytes are decoded lossily — callers that need raw
    /// bytes should match on `Value::Literal` directly.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Atom(s) | Value::QuotedString(s) => Some(s.clone()),
            Value::Literal(b) => Some(String::from_utf8_lossy(b).to_string()),
            Value::Nil | Value::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

/// Tokenizes `text` (a logical IMAP response line, or any parenthesized
/// sub-slice of one) into a flat sequence of [`Value`]s at the top
/// nesting level, consuming literal payloads from `payloads` by cursor
/// whenever a `{N}` placeholder is seen. Parenthesized groups nest into
/// `Value::List`.
pub struct Tokenizer<'a> {
    bytes: &'a [u8],
    pos: usize,
    payloads: &'a [Vec<u8>],
    cursor: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &'a str, payloads: &'a [Vec<u8>]) -> Self {
        Self { bytes: text.as_bytes(), pos: 0, payloads, cursor: 0 }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] == b' ' {
            self.pos += 1;
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// Consume every remaining `Value` at the current nesting level.
    pub fn parse_all(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        self.skip_ws();
        while !self.at_end() && self.peek() != Some(b')') {
            match self.parse_one() {
                Some(v) => out.push(v),
                None => break,
            }
            self.skip_ws();
        }
        out
    }

    /// Consume one value: atom, quoted string, NIL, literal placeholder,
    /// or a parenthesized group (recursively tokenized).
    pub fn parse_one(&mut self) -> Option<Value> {
        self.skip_ws();
        match self.peek()? {
            b'(' => {
                self.pos += 1;
                let items = self.parse_all();
                if self.peek() == Some(b')') {
                    self.pos += 1;
                }
                Some(Value::List(items))
            }
            b'"' => {
                self.pos += 1;
                let mut s = String::new();
                while let Some(b) = self.peek() {
                    self.pos += 1;
                    match b {
                        b'"' => break,
                        b'\\' => {
                            if let Some(next) = self.peek() {
                                s.push(next as char);
                                self.pos += 1;
                            }
                        }
                        _ => s.push(b as char),
                    }
                }
                Some(Value::QuotedString(s))
            }
            b'{' => {
                let start = self.pos;
                self.pos += 1;
                while self.peek().map(|b| b != b'}').unwrap_or(false) {
                    self.pos += 1;
                }
                if self.peek() == Some(b'}') {
                    self.pos += 1;
                }
                let _marker = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or_default();
                let payload = self.payloads.get(self.cursor).cloned().unwrap_or_default();
                self.cursor += 1;
                Some(Value::Literal(payload))
            }
            _ => {
                let start = self.pos;
                while let Some(b) = self.peek() {
                    if b == b' ' || b == b'(' || b == b')' || b == b'"' {
                        break;
                    }
                    self.pos += 1;
                }
                let atom = std::str::from_utf8(&self.bytes[start..self.pos]).ok()?.to_string();
                if atom.eq_ignore_ascii_case("NIL") {
                    Some(Value::Nil)
                } else {
                    Some(Value::Atom(atom))
                }
            }
        }
    }

    pub fn payload_cursor(&self) -> usize {
        self.cursor
    }
}

/// Convenience: tokenize the whole of `text` and return all top-level values.
pub fn tokenize(text: &str, payloads: &[Vec<u8>]) -> Vec<Value> {
    Tokenizer::new(text, payloads).parse_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_flat_list() {
        let vals = tokenize(r#"FLAGS (\Seen \Answered) UID 42"#, &[]);
        assert_eq!(vals.len(), 4);
        assert_eq!(vals[0], Value::Atom("FLAGS".to_string()));
        assert_eq!(vals[1], Value::List(vec![Value::Atom("\\Seen".to_string()), Value::Atom("\\Answered".to_string())]));
        assert_eq!(vals[3], Value::Atom("42".to_string()));
    }

    #[test]
    fn resolves_literal_placeholder_by_cursor() {
        let payloads = vec![b"hello world".to_vec()];
        let vals = tokenize("BODY[] {11}", &payloads);
        assert_eq!(vals[1], Value::Literal(b"hello world".to_vec()));
    }

    #[test]
    fn nil_is_case_insensitive() {
        let vals = tokenize("nil NIL Nil", &[]);
        assert!(vals.iter().all(|v| v.is_nil()));
    }

    #[test]
    fn quoted_string_handles_escapes() {
        let vals = tokenize(r#""a \"quoted\" value""#, &[]);
        assert_eq!(vals[0], Value::QuotedString("a \"quoted\" value".to_string()));
    }

    #[test]
    fn skips_unknown_tokens_without_erroring() {
        let vals = tokenize("X-VENDOR-EXT (foo bar) FLAGS (\\Seen)", &[]);
        assert_eq!(vals.len(), 4);
    }
}
