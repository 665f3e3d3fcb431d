/*
 * pop3.rs
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

//! POP3 response decoding: single-line `+OK`/`-ERR`/`+` replies by default,
//! switching to dot-stuffed multiline collection when the caller knows the
//! next command's reply is multiline (LIST, UIDL, CAPA, TOP, RETR).

use super::line::LineBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pop3Status {
    Ok,
    Err,
    Continuation,
}

/// One decoded event. A multiline reply is `Status` followed by zero or
/// more `BodyLine`s and a terminating `BodyEnd` — callers assemble
/// whichever surface shape (line vector, joined raw bytes, streamed
/// callback) they need from that event sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pop3Event {
    Status { status: Pop3Status, message: String },
    /// Dot-unstuffed body line, 8-bit clean (not validated as UTF-8).
    BodyLine(Vec<u8>),
    BodyEnd,
}

enum Mode {
    Status,
    Body,
}

pub struct Pop3MultilineDecoder {
    lines: LineBuffer,
    mode: Mode,
    multiline_requested: bool,
}

impl Default for Pop3MultilineDecoder {
    fn default() -> Self {
        Self { lines: LineBuffer::new(), mode: Mode::Status, multiline_requested: false }
    }
}

impl Pop3MultilineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call before sending a command whose reply is multiline. Consumed by
    /// the next status line observed.
    pub fn expect_multiline(&mut self) {
        self.multiline_requested = true;
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.lines.push(bytes);
    }

    /// Pop the next decoded event, if a full line has arrived.
    pub fn poll(&mut self) -> Option<Pop3Event> {
        let raw_line = self.lines.pop_line()?;
        match self.mode {
            Mode::Status => {
                let line_str = String::from_utf8_lossy(&raw_line).to_string();
                let (status, message) = parse_status(&line_str);
                if self.multiline_requested {
                    self.multiline_requested = false;
                    // A body only follows a positive reply; -ERR terminates
                    // the exchange with this single line, same as any other
                    // command, so the next line is the next status line.
                    if status == Pop3Status::Ok {
                        self.mode = Mode::Body;
                    }
                }
                Some(Pop3Event::Status { status, message })
            }
            Mode::Body => {
                if raw_line == b"." {
                    self.mode = Mode::Status;
                    Some(Pop3Event::BodyEnd)
                } else {
                    let unstuffed = if raw_line.first() == Some(&b'.') {
                        raw_line[1..].to_vec()
                    } else {
                        raw_line
                    };
                    Some(Pop3Event::BodyLine(unstuffed))
                }
            }
        }
    }
}

fn parse_status(line: &str) -> (Pop3Status, String) {
    if let Some(rest) = line.strip_prefix("+OK") {
        (Pop3Status::Ok, rest.trim_start().to_string())
    } else if let Some(rest) = line.strip_prefix("-ERR") {
        (Pop3Status::Err, rest.trim_start().to_string())
    } else if let Some(rest) = line.strip_prefix('+') {
        (Pop3Status::Continuation, rest.trim_start().to_string())
    } else {
        (Pop3Status::Err, line.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_ok() {
        let mut d = Pop3MultilineDecoder::new();
        d.push(b"+OK 2 320\r\n");
        assert_eq!(
            d.poll(),
            Some(Pop3Event::Status { status: Pop3Status::Ok, message: "2 320".to_string() })
        );
        assert_eq!(d.poll(), None);
    }

    #[test]
    fn continuation_is_distinct_from_ok() {
        let mut d = Pop3MultilineDecoder::new();
        d.push(b"+ c2FsdA==\r\n");
        assert_eq!(
            d.poll(),
            Some(Pop3Event::Status { status: Pop3Status::Continuation, message: "c2FsdA==".to_string() })
        );
    }

    #[test]
    fn streaming_retr_scenario() {
        // spec.md scenario: "+OK\r\n\r\n..\r\n..dot\r\nplain\r\n.\r\n"
        let mut d = Pop3MultilineDecoder::new();
        d.expect_multiline();
        d.push(b"+OK\r\n\r\n..\r\n..dot\r\nplain\r\n.\r\n");
        let mut events = Vec::new();
        while let Some(e) = d.poll() {
            events.push(e);
        }
        assert_eq!(
            events,
            vec![
                Pop3Event::Status { status: Pop3Status::Ok, message: String::new() },
                Pop3Event::BodyLine(b"".to_vec()),
                Pop3Event::BodyLine(b".".to_vec()),
                Pop3Event::BodyLine(b".dot".to_vec()),
                Pop3Event::BodyLine(b"plain".to_vec()),
                Pop3Event::BodyEnd,
            ]
        );
    }

    #[test]
    fn split_chunks_including_terminator() {
        let mut d = Pop3MultilineDecoder::new();
        d.expect_multiline();
        d.push(b"+OK\r\nhi\r\n.");
        assert_eq!(
            d.poll(),
            Some(Pop3Event::Status { status: Pop3Status::Ok, message: String::new() })
        );
        assert_eq!(d.poll(), Some(Pop3Event::BodyLine(b"hi".to_vec())));
        assert_eq!(d.poll(), None);
        d.push(b"\r\n");
        assert_eq!(d.poll(), Some(Pop3Event::BodyEnd));
    }
}
