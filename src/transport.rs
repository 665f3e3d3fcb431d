/*
 * transport.rs
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

//! The byte-stream capability sessions consume. Sessions never open a
//! socket or perform TLS themselves; the embedding application supplies a
//! [`Transport`] backed by plain TCP, TLS, or anything else that moves bytes.

use std::io;

/// Channel-binding data for SASL mechanisms with a `-PLUS` variant
/// (e.g. SCRAM-SHA-256-PLUS). `None` means the transport cannot provide one,
/// which rules out `-PLUS` mechanisms during negotiation.
#[derive(Debug, Clone)]
pub struct ChannelBindingData {
    pub binding_type: &'static str,
    pub data: Vec<u8>,
}

/// A byte-stream connection to a mail server.
///
/// Implementations are not required to be `Send`/`Sync`; a session owns its
/// transport exclusively and never shares it across tasks.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Write `bytes` in full, or fail. Partial writes must not be observable
    /// to the caller — implementations retry internally.
    async fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read at least one byte. Returns `Ok(vec![])` only at EOF; callers
    /// must treat an empty result as a terminated connection, not "no data
    /// yet". May return fewer bytes than any internal buffer holds.
    async fn read_chunk(&mut self) -> io::Result<Vec<u8>>;

    /// Upgrade a plaintext connection in place (STARTTLS/STLS). The default
    /// implementation reports the upgrade as unsupported; transports that
    /// can is should override it.
    async fn start_tls(&mut self, _validate_cert: bool) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "transport does not support start_tls",
        ))
    }

    /// Channel-binding data for the current connection, if the transport is
    /// TLS and can expose `tls-server-end-point`/`tls-exporter` bindings.
    fn channel_binding(&self) -> Option<ChannelBindingData> {
        None
    }
}
