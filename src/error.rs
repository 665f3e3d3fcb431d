/*
 * error.rs
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

//! Error taxonomy shared by IMAP, POP3, SMTP sessions and the pool.

use std::io;

use crate::imap::response::ImapStatus;
use crate::sasl::SaslError;

/// A phase in one of the per-protocol session state machines, used to
/// report `InvalidPhase` without naming a specific protocol's enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connected,
    Authenticated,
    Selected,
    LoggedOut,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Disconnected => "disconnected",
            Phase::Connected => "connected",
            Phase::Authenticated => "authenticated",
            Phase::Selected => "selected",
            Phase::LoggedOut => "logged out",
        };
        write!(f, "{}", s)
    }
}

/// Everything a session operation can fail with.
#[derive(Debug)]
pub enum ProtocolError {
    /// The requested command needs `required` phase but the session is in `actual`.
    InvalidPhase { required: Phase, actual: Phase },
    /// A per-operation deadline elapsed; the session is now broken.
    Timeout,
    TransportWrite(String),
    TransportRead(String),
    /// SMTP reply code plus optional enhanced status code ("X.Y.Z").
    SmtpError { code: u16, enhanced: Option<String>, text: String },
    Pop3Error(String),
    /// IMAP tagged/untagged NO or BAD reply.
    ImapError { status: ImapStatus, text: String },
    StartTlsNotSupported,
    IdleNotSupported,
    NotifyNotSupported,
    AuthenticationFailed(String),
    BadResponse(String),
    PoolExhausted,
    PoolClosed,
}

impl ProtocolError {
    pub fn invalid_phase(required: Phase, actual: Phase) -> Self {
        Self::InvalidPhase { required, actual }
    }

    pub fn bad_response(msg: impl Into<String>) -> Self {
        Self::BadResponse(msg.into())
    }
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::InvalidPhase { required, actual } => {
                write!(f, "operation requires {} but session is {}", required, actual)
            }
            ProtocolError::Timeout => write!(f, "operation timed out"),
            ProtocolError::TransportWrite(e) => write!(f, "transport write failed: {}", e),
            ProtocolError::TransportRead(e) => write!(f, "transport read failed: {}", e),
            ProtocolError::SmtpError { code, enhanced, text } => match enhanced {
                Some(e) => write!(f, "{} {} {}", code, e, text),
                None => write!(f, "{} {}", code, text),
            },
            ProtocolError::Pop3Error(text) => write!(f, "-ERR {}", text),
            ProtocolError::ImapError { status, text } => write!(f, "{:?} {}", status, text),
            ProtocolError::StartTlsNotSupported => write!(f, "server did not advertise STARTTLS"),
            ProtocolError::IdleNotSupported => write!(f, "server did not advertise IDLE"),
            ProtocolError::NotifyNotSupported => write!(f, "server did not advertise NOTIFY"),
            ProtocolError::AuthenticationFailed(text) => write!(f, "authentication failed: {}", text),
            ProtocolError::BadResponse(text) => write!(f, "malformed server response: {}", text),
            ProtocolError::PoolExhausted => write!(f, "connection pool exhausted"),
            ProtocolError::PoolClosed => write!(f, "connection pool is closed"),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<SaslError> for ProtocolError {
    fn from(e: SaslError) -> Self {
        ProtocolError::AuthenticationFailed(e.to_string())
    }
}

/// Converts an I/O error observed while reading; callers that know which
/// direction failed should construct `TransportRead`/`TransportWrite`
/// directly instead of relying on this blanket conversion.
impl From<io::Error> for ProtocolError {
    fn from(e: io::Error) -> Self {
        ProtocolError::TransportRead(e.to_string())
    }
}
