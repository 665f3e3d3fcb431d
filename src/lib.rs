/*
 * lib.rs
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

//! Protocol core for IMAP4rev1, POP3 and SMTP clients.
//!
//! This crate owns the hard part of talking to mail servers: incremental
//! byte decoders that cope with fragmentation and IMAP's length-prefixed
//! literals, typed response parsers, the per-protocol session state
//! machines, a SASL engine, secret redaction for protocol logging, and a
//! connection pool with retry/backoff. It never opens a socket itself —
//! callers supply a [`transport::Transport`] implementation — and it never
//! parses MIME bodies, only the envelope-level [`message::Message`]
//! capability needed to submit mail over SMTP.

pub mod capabilities;
pub mod decode;
pub mod error;
pub mod flags;
pub mod imap;
pub mod logger;
pub mod message;
pub mod pool;
pub mod pop3;
pub mod retry;
pub mod sasl;
pub mod secret_detector;
pub mod smtp;
pub mod transport;
pub mod uid;

pub use error::ProtocolError;
pub use transport::Transport;
