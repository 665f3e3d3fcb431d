/*
 * retry.rs
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

//! Exponential (or linear) backoff with a pluggable error classifier,
//! shared by [`crate::pool`] to decide whether a failed connection
//! attempt or operation is worth retrying.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Transient,
    Permanent,
    RequiresReconnection,
}

/// Decides how an error should be treated by the retry loop.
pub trait ErrorClassifier {
    fn classify(&self, error: &ProtocolError) -> Classification;
}

/// Timeouts and SMTP 4xx are transient; SMTP 5xx and authentication
/// failures are permanent; a transport write failure forces the pool to
/// discard and recreate the connection rather than retry on it in place.
pub struct DefaultErrorClassifier;

impl ErrorClassifier for DefaultErrorClassifier {
    fn classify(&self, error: &ProtocolError) -> Classification {
        match error {
            ProtocolError::Timeout => Classification::Transient,
            ProtocolError::SmtpError { code, .. } if (400..500).contains(code) => Classification::Transient,
            ProtocolError::SmtpError { code, .. } if *code >= 500 => Classification::Permanent,
            ProtocolError::AuthenticationFailed(_) => Classification::Permanent,
            ProtocolError::TransportWrite(_) => Classification::RequiresReconnection,
            ProtocolError::TransportRead(_) => Classification::RequiresReconnection,
            ProtocolError::Pop3Error(_) => Classification::Permanent,
            ProtocolError::ImapError { .. } => Classification::Permanent,
            ProtocolError::PoolExhausted | ProtocolError::PoolClosed => Classification::Permanent,
            ProtocolError::InvalidPhase { .. } | ProtocolError::BadResponse(_) => Classification::Permanent,
            ProtocolError::StartTlsNotSupported | ProtocolError::IdleNotSupported | ProtocolError::NotifyNotSupported => {
                Classification::Permanent
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub use_jitter: bool,
}

impl RetryPolicy {
    /// No retries: the body runs exactly once.
    pub fn none() -> Self {
        Self { max_retries: 0, initial_delay_ms: 0, max_delay_ms: 0, backoff_multiplier: 1.0, use_jitter: false }
    }

    /// 3 retries, 1s doubling to a 30s ceiling.
    pub fn default_policy() -> Self {
        Self { max_retries: 3, initial_delay_ms: 1_000, max_delay_ms: 30_000, backoff_multiplier: 2.0, use_jitter: true }
    }

    /// 5 retries, 0.5s doubling to a 30s ceiling.
    pub fn aggressive() -> Self {
        Self { max_retries: 5, initial_delay_ms: 500, max_delay_ms: 30_000, backoff_multiplier: 2.0, use_jitter: true }
    }

    /// A fixed delay repeated `max` times (multiplier 1.0).
    pub fn linear(max: u32, delay_ms: u64) -> Self {
        Self { max_retries: max, initial_delay_ms: delay_ms, max_delay_ms: delay_ms, backoff_multiplier: 1.0, use_jitter: false }
    }

    /// Delay before attempt `k` (0-indexed, the retry after the `k`-th
    /// failure): `min(initial * multiplier^k, max)`, plus a uniform
    /// `[0, base/4]` jitter when enabled.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(attempt as i32);
        let base = base.min(self.max_delay_ms as f64).max(0.0);
        let millis = if self.use_jitter && base > 0.0 {
            base + jitter_fraction() * (base / 4.0)
        } else {
            base
        };
        Duration::from_millis(millis.round() as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::default_policy()
    }
}

/// A cheap uniform value in `[0, 1)` derived from the low bits of the
/// current time, in the same spirit as [`crate::sasl::ntlm`]'s client
/// challenge: this is jitter, not a security primitive, so a
/// cryptographically strong source is unnecessary.
fn jitter_fraction() -> f64 {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().subsec_nanos();
    (nanos % 1_000_000) as f64 / 1_000_000.0
}

/// Run `body` until it succeeds, a classified-permanent error occurs, or
/// `policy.max_retries` attempts have been exhausted. A
/// `RequiresReconnection` classification is surfaced to the caller
/// immediately without sleeping — retrying the same broken connection is
/// pointless; the caller (the pool) must discard it and hand back a fresh
/// one before trying again.
pub async fn retry<F, Fut, T>(policy: &RetryPolicy, classifier: &dyn ErrorClassifier, mut body: F) -> Result<T, ProtocolError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProtocolError>>,
{
    let mut attempt = 0u32;
    loop {
        match body().await {
            Ok(value) => return Ok(value),
            Err(error) => match classifier.classify(&error) {
                Classification::Permanent | Classification::RequiresReconnection => return Err(error),
                Classification::Transient => {
                    if attempt >= policy.max_retries {
                        return Err(error);
                    }
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                    attempt += 1;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn default_policy_matches_spec_preset() {
        let p = RetryPolicy::default_policy();
        assert_eq!(p.max_retries, 3);
        assert_eq!(p.initial_delay_ms, 1_000);
        assert_eq!(p.max_delay_ms, 30_000);
        assert_eq!(p.backoff_multiplier, 2.0);
    }

    #[test]
    fn delay_doubles_and_caps_at_max() {
        let p = RetryPolicy { max_retries: 10, initial_delay_ms: 1_000, max_delay_ms: 5_000, backoff_multiplier: 2.0, use_jitter: false };
        assert_eq!(p.delay_for(0), Duration::from_millis(1_000));
        assert_eq!(p.delay_for(1), Duration::from_millis(2_000));
        assert_eq!(p.delay_for(2), Duration::from_millis(4_000));
        assert_eq!(p.delay_for(3), Duration::from_millis(5_000));
        assert_eq!(p.delay_for(10), Duration::from_millis(5_000));
    }

    #[test]
    fn jitter_never_reduces_the_base_delay() {
        let p = RetryPolicy { max_retries: 1, initial_delay_ms: 1_000, max_delay_ms: 30_000, backoff_multiplier: 2.0, use_jitter: true };
        let d = p.delay_for(0);
        assert!(d >= Duration::from_millis(1_000));
        assert!(d <= Duration::from_millis(1_250));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_attempts_bounded_by_max_retries_plus_one() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy { max_retries: 2, initial_delay_ms: 1, max_delay_ms: 1, backoff_multiplier: 1.0, use_jitter: false };
        let result: Result<(), ProtocolError> = retry(&policy, &DefaultErrorClassifier, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProtocolError::Timeout) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_stops_after_one_attempt() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default_policy();
        let result: Result<(), ProtocolError> = retry(&policy, &DefaultErrorClassifier, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProtocolError::AuthenticationFailed("bad password".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_without_retrying_when_body_succeeds() {
        let policy = RetryPolicy::default_policy();
        let result = retry(&policy, &DefaultErrorClassifier, || async { Ok::<_, ProtocolError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
