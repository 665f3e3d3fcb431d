/*
 * dot_stuffer.rs
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

//! Dot stuffing for SMTP DATA (RFC 5321 §4.5.2: lines starting with `.`
//! get an extra `.` prepended) and its inverse, used when a caller reads
//! a dot-stuffed payload back out (e.g. a relaying client, or tests that
//! round-trip a message).

#[derive(Clone, Copy, PartialEq)]
enum State {
    /// At the beginning of a line (initial state, or immediately after CRLF).
    LineStart,
    /// Mid-line.
    Normal,
    /// Saw CR, waiting for LF.
    SawCr,
}

/// Any line that starts with `.` gets an extra `.` prepended. The
/// beginning of the message is treated as the start of a line.
pub struct DotStuffer {
    state: State,
    emitted: bool,
}

impl Default for DotStuffer {
    fn default() -> Self {
        Self { state: State::LineStart, emitted: false }
    }
}

impl DotStuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a chunk; call `out` for each slice to send. Bytes flow
    /// through transparently except for the extra `.` inserted before any
    /// `.` that appears at the start of a line.
    pub fn process_chunk<F>(&mut self, chunk: &[u8], mut out: F)
    where
        F: FnMut(&[u8]),
    {
        let mut start = 0;
        for i in 0..chunk.len() {
            let b = chunk[i];
            match self.state {
                State::LineStart => {
                    if b == b'.' {
                        out(&chunk[start..i]);
                        out(b".");
                        start = i;
                    }
                    self.state = if b == b'\r' { State::SawCr } else { State::Normal };
                }
                State::Normal => {
                    if b == b'\r' {
                        self.state = State::SawCr;
                    }
                }
                State::SawCr => {
                    self.state = if b == b'\n' {
                        State::LineStart
                    } else if b == b'\r' {
                        State::SawCr
                    } else {
                        State::Normal
                    };
                }
            }
        }
        if start < chunk.len() {
            self.emitted = true;
            out(&chunk[start..]);
        }
    }

    /// Emit the `CRLF.CRLF` terminator, ensuring the message ends with
    /// CRLF first; resets state for the next message on this connection.
    pub fn end_message<F>(&mut self, mut out: F)
    where
        F: FnMut(&[u8]),
    {
        match self.state {
            State::LineStart if self.emitted => out(b".\r\n"),
            State::SawCr => out(b"\n.\r\n"),
            _ => out(b"\r\n.\r\n"),
        }
        self.state = State::LineStart;
        self.emitted = false;
    }

    pub fn reset(&mut self) {
        self.state = State::LineStart;
        self.emitted = false;
    }
}

/// The inverse of [`DotStuffer`]: strips exactly one leading `.` from any
/// line that starts with `..`, leaving every other line untouched.
pub struct DotUnstuffer {
    at_line_start: bool,
}

impl Default for DotUnstuffer {
    fn default() -> Self {
        Self { at_line_start: true }
    }
}

impl DotUnstuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_chunk<F>(&mut self, chunk: &[u8], mut out: F)
    where
        F: FnMut(&[u8]),
    {
        let mut i = 0;
        while i < chunk.len() {
            if self.at_line_start && chunk[i] == b'.' {
                i += 1;
                self.at_line_start = false;
                continue;
            }
            let start = i;
            while i < chunk.len() {
                let b = chunk[i];
                i += 1;
                if b == b'\n' {
                    self.at_line_start = true;
                    break;
                }
                self.at_line_start = false;
            }
            out(&chunk[start..i]);
        }
    }
}
