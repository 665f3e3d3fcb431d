/*
 * mod.rs
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

//! Incremental decoders: pure byte-in/frame-out state machines with no
//! transport dependency, so they behave identically regardless of how the
//! input byte stream happens to be chunked.

mod imap_literal;
mod line;
mod pop3;
mod smtp;

pub use imap_literal::{ImapLiteralDecoder, ImapLiteralMessage};
pub use line::LineBuffer;
pub use pop3::{Pop3Event, Pop3MultilineDecoder, Pop3Status};
pub use smtp::{SmtpResponse, SmtpResponseDecoder};
