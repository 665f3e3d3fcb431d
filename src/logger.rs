/*
 * logger.rs
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

//! Wire-level protocol tracing. Lines are redacted through a
//! [`SecretDetector`] before being handed to the `log` crate at `trace`
//! level, under the `tagliacarte::wire` target, so embedding applications
//! opt in with their own logger/filter the same way they would for any
//! other crate's diagnostics.

use chrono::Utc;

use crate::secret_detector::{apply_redactions, SecretDetector};

const DEFAULT_MASK: &str = "*";

/// Traces one connection's client/server line traffic.
pub struct ProtocolLogger {
    detector: Box<dyn SecretDetector>,
    include_timestamps: bool,
    mask: String,
}

impl ProtocolLogger {
    pub fn new(detector: Box<dyn SecretDetector>) -> Self {
        Self { detector, include_timestamps: false, mask: DEFAULT_MASK.to_string() }
    }

    pub fn with_timestamps(mut self, include: bool) -> Self {
        self.include_timestamps = include;
        self
    }

    pub fn with_mask(mut self, mask: impl Into<String>) -> Self {
        self.mask = mask.into();
        self
    }

    /// Redact and trace one client-to-server line (no trailing CRLF).
    pub fn log_client_line(&mut self, line: &[u8]) {
        let ranges = self.detector.scan_client_line(line);
        let redacted = apply_redactions(line, &ranges, &self.mask);
        log::trace!(target: "tagliacarte::wire", "{}", format_line(self.include_timestamps, 'C', &redacted));
    }

    /// Redact and trace one server-to-client line (no trailing CRLF).
    pub fn log_server_line(&mut self, line: &[u8]) {
        let ranges = self.detector.scan_server_line(line);
        let redacted = apply_redactions(line, &ranges, &self.mask);
        log::trace!(target: "tagliacarte::wire", "{}", format_line(self.include_timestamps, 'S', &redacted));
    }
}

/// Builds the displayed trace line: `[HH:MM:SS.fff ]C: text` (timestamp
/// prefix only when enabled). Pulled out of the logging calls above so it
/// can be exercised without installing a `log` implementation.
fn format_line(include_timestamp: bool, direction: char, bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if include_timestamp {
        let ts = Utc::now().format("%H:%M:%S%.3f");
        format!("{} {}: {}", ts, direction, text)
    } else {
        format!("{}: {}", direction, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret_detector::Pop3SecretDetector;

    #[test]
    fn format_line_without_timestamp() {
        assert_eq!(format_line(false, 'C', b"USER alice"), "C: USER alice");
    }

    #[test]
    fn format_line_with_timestamp_has_prefix() {
        let line = format_line(true, 'S', b"+OK");
        assert!(line.ends_with("S: +OK"));
        assert!(line.contains(':'));
    }

    #[test]
    fn client_line_is_redacted_before_trace() {
        let mut logger = ProtocolLogger::new(Box::new(Pop3SecretDetector::new()));
        // No assertion on the `log` sink itself (none is installed in
        // tests); this exercises the redaction path for panics only.
        logger.log_client_line(b"USER alice");
        logger.log_client_line(b"PASS hunter2");
    }

    #[test]
    fn custom_mask_is_honored_in_redaction() {
        let ranges = crate::secret_detector::Pop3SecretDetector::new().scan_client_line(b"USER alice");
        let redacted = apply_redactions(b"USER alice", &ranges, "#");
        assert_eq!(&redacted, b"USER #####");
    }
}
