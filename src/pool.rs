/*
 * pool.rs
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

//! A fair, task-safe pool of authenticated connections. Where a store in
//! the IMAP client lazily reconnects a single shared session on
//! staleness, this generalizes the same idea — lazily create, discard
//! when stale, reuse otherwise — to a bounded set of connections shared
//! across concurrent callers, with callers that find the pool full parked
//! in FIFO order rather than racing.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use crate::error::ProtocolError;
use crate::retry::{retry, ErrorClassifier, RetryPolicy};

/// A pooled connection's health check and teardown. Implemented by
/// whatever session wrapper the embedding application builds around
/// [`crate::imap::session::ImapSession`]/[`crate::pop3::session::Pop3Session`]/
/// [`crate::smtp::session::SmtpSession`].
#[allow(async_fn_in_trait)]
pub trait PooledConnection: Send {
    /// `false` once the underlying transport or session phase can no
    /// longer serve requests (closed, logged out, broken by a timeout).
    fn is_healthy(&self) -> bool;

    /// Best-effort graceful teardown; pool draining does not wait for
    /// errors from this to propagate anywhere but a log line.
    async fn disconnect(&mut self);
}

/// Builds and authenticates a fresh connection. Two-phase to match
/// `spec.md`'s `ServiceFactory` + `Authenticator` split: the factory
/// opens the transport and negotiates protocol state, the authenticator
/// then logs in with the pool's configured credentials.
#[allow(async_fn_in_trait)]
pub trait ServiceFactory<C: PooledConnection> {
    async fn connect(&self, config: &ServerConfig) -> Result<C, ProtocolError>;
}

#[allow(async_fn_in_trait)]
pub trait Authenticator<C: PooledConnection> {
    async fn authenticate(&self, conn: &mut C, credentials: &Credentials) -> Result<(), ProtocolError>;
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub use_implicit_tls: bool,
    pub use_starttls: bool,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub access_token: Option<String>,
}

struct PoolState<C> {
    available: VecDeque<C>,
    in_use: usize,
    closed: bool,
    next_ticket: u64,
    now_serving: u64,
}

/// A bounded, fair pool of connections of type `C`.
///
/// `acquire`/`release`/`close` are safe to call from concurrent tasks; the
/// queues are protected by an internal `tokio::sync::Mutex`. Fairness is a
/// ticket counter: each `acquire` call draws a ticket as soon as it is
/// called, and only attempts to take a connection once `now_serving`
/// reaches that ticket, so a caller that arrives after another is already
/// parked can never take a slot ahead of it. `waiter_woken` just rings the
/// bell for everyone parked to recheck their ticket; the ticket counter,
/// not `Notify`'s wake order, is what decides who actually proceeds.
pub struct ConnectionPool<C, F, A, Cls>
where
    C: PooledConnection,
    F: ServiceFactory<C>,
    A: Authenticator<C>,
    Cls: ErrorClassifier,
{
    factory: F,
    authenticator: A,
    classifier: Cls,
    config: ServerConfig,
    credentials: Credentials,
    max_connections: usize,
    retry_policy: RetryPolicy,
    state: Arc<Mutex<PoolState<C>>>,
    waiter_woken: Arc<Notify>,
}

impl<C, F, A, Cls> ConnectionPool<C, F, A, Cls>
where
    C: PooledConnection,
    F: ServiceFactory<C>,
    A: Authenticator<C>,
    Cls: ErrorClassifier,
{
    pub fn new(
        factory: F,
        authenticator: A,
        classifier: Cls,
        config: ServerConfig,
        credentials: Credentials,
        max_connections: usize,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            factory,
            authenticator,
            classifier,
            config,
            credentials,
            max_connections,
            retry_policy,
            state: Arc::new(Mutex::new(PoolState {
                available: VecDeque::new(),
                in_use: 0,
                closed: false,
                next_ticket: 0,
                now_serving: 0,
            })),
            waiter_woken: Arc::new(Notify::new()),
        }
    }

    async fn create_authenticated(&self) -> Result<C, ProtocolError> {
        let mut conn = self.factory.connect(&self.config).await?;
        self.authenticator.authenticate(&mut conn, &self.credentials).await?;
        Ok(conn)
    }

    /// Returns a healthy, authenticated connection, parking the caller
    /// behind already-waiting callers (FIFO) if the pool is at capacity.
    pub async fn acquire(&self) -> Result<C, ProtocolError> {
        let ticket = {
            let mut guard = self.state.lock().await;
            let ticket = guard.next_ticket;
            guard.next_ticket += 1;
            ticket
        };
        loop {
            {
                let mut guard = self.state.lock().await;
                if guard.closed {
                    return Err(ProtocolError::PoolClosed);
                }
                if ticket == guard.now_serving {
                    while let Some(conn) = guard.available.pop_front() {
                        if conn.is_healthy() {
                            guard.in_use += 1;
                            guard.now_serving += 1;
                            drop(guard);
                            self.waiter_woken.notify_waiters();
                            return Ok(conn);
                        }
                        // Stale: drop it and keep looking at the next available one.
                    }
                    if guard.in_use + guard.available.len() < self.max_connections {
                        guard.in_use += 1;
                        guard.now_serving += 1;
                        drop(guard);
                        self.waiter_woken.notify_waiters();
                        // Capacity was reserved above (in_use incremented);
                        // build the connection outside the lock so slow I/O
                        // doesn't block others.
                        return match self.create_authenticated().await {
                            Ok(conn) => Ok(conn),
                            Err(e) => {
                                let mut guard = self.state.lock().await;
                                guard.in_use -= 1;
                                drop(guard);
                                self.waiter_woken.notify_waiters();
                                Err(e)
                            }
                        };
                    }
                    // Our turn, but nothing available and no free capacity:
                    // keep our ticket and wait for a release to free a slot.
                }
            }
            self.waiter_woken.notified().await;
        }
    }

    /// Returns `conn` to the available list unless the pool has been
    /// closed, in which case it is disconnected instead, and wakes every
    /// parked waiter so whichever ticket is now at the head of the queue
    /// can proceed (closing changes what `acquire` does, not whether a
    /// parked caller should recheck).
    pub async fn release(&self, mut conn: C) {
        let mut guard = self.state.lock().await;
        guard.in_use -= 1;
        if guard.closed {
            drop(guard);
            conn.disconnect().await;
        } else {
            guard.available.push_back(conn);
        }
        self.waiter_woken.notify_waiters();
    }

    /// Marks the pool closed, disconnects every available connection, and
    /// wakes all waiters so they observe `PoolClosed` instead of hanging.
    pub async fn close(&self) {
        let mut drained = {
            let mut guard = self.state.lock().await;
            guard.closed = true;
            std::mem::take(&mut guard.available)
        };
        for mut conn in drained.drain(..) {
            conn.disconnect().await;
        }
        self.waiter_woken.notify_waiters();
    }

    /// Scoped acquisition: acquire, run `body`, release on every exit path.
    pub async fn with_connection<T, Body, Fut>(&self, body: Body) -> Result<T, ProtocolError>
    where
        Body: FnOnce(&mut C) -> Fut,
        Fut: std::future::Future<Output = Result<T, ProtocolError>>,
    {
        let mut conn = self.acquire().await?;
        let result = body(&mut conn).await;
        self.release(conn).await;
        result
    }

    /// Like [`Self::with_connection`], but the body is retried under the
    /// pool's configured [`RetryPolicy`] on transient failures. A
    /// `RequiresReconnection` classification discards the connection
    /// (rather than returning it to the pool) before propagating the
    /// error, so the next `acquire()` gets a fresh one.
    pub async fn with_retrying_connection<T, Body, Fut>(&self, mut body: Body) -> Result<T, ProtocolError>
    where
        Body: FnMut(&mut C) -> Fut,
        Fut: std::future::Future<Output = Result<T, ProtocolError>>,
    {
        let mut conn = self.acquire().await?;
        let result = retry(&self.retry_policy, &self.classifier, || body(&mut conn)).await;
        match &result {
            Err(e) if matches!(self.classifier.classify(e), crate::retry::Classification::RequiresReconnection) => {
                conn.disconnect().await;
                let mut guard = self.state.lock().await;
                guard.in_use -= 1;
                drop(guard);
                self.waiter_woken.notify_waiters();
            }
            _ => self.release(conn).await,
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeConn {
        healthy: bool,
        disconnected: bool,
    }

    impl PooledConnection for FakeConn {
        fn is_healthy(&self) -> bool {
            self.healthy
        }

        async fn disconnect(&mut self) {
            self.disconnected = true;
        }
    }

    struct FakeFactory {
        created: Arc<AtomicUsize>,
    }

    impl ServiceFactory<FakeConn> for FakeFactory {
        async fn connect(&self, _config: &ServerConfig) -> Result<FakeConn, ProtocolError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(FakeConn { healthy: true, disconnected: false })
        }
    }

    struct FakeAuthenticator;

    impl Authenticator<FakeConn> for FakeAuthenticator {
        async fn authenticate(&self, _conn: &mut FakeConn, _credentials: &Credentials) -> Result<(), ProtocolError> {
            Ok(())
        }
    }

    fn test_config() -> (ServerConfig, Credentials) {
        (
            ServerConfig { host: "mail.example.com".to_string(), port: 993, use_implicit_tls: true, use_starttls: false },
            Credentials { username: "alice".to_string(), password: "hunter2".to_string(), access_token: None },
        )
    }

    #[tokio::test]
    async fn acquire_creates_up_to_max_then_reuses_released() {
        let (config, creds) = test_config();
        let created = Arc::new(AtomicUsize::new(0));
        let pool = ConnectionPool::new(
            FakeFactory { created: created.clone() },
            FakeAuthenticator,
            crate::retry::DefaultErrorClassifier,
            config,
            creds,
            2,
            RetryPolicy::none(),
        );
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
        pool.release(a).await;
        let c = pool.acquire().await.unwrap();
        // Reused the released connection instead of creating a third.
        assert_eq!(created.load(Ordering::SeqCst), 2);
        pool.release(b).await;
        pool.release(c).await;
    }

    #[tokio::test]
    async fn acquire_discards_stale_connection_and_creates_fresh_one() {
        let (config, creds) = test_config();
        let created = Arc::new(AtomicUsize::new(0));
        let pool = ConnectionPool::new(
            FakeFactory { created: created.clone() },
            FakeAuthenticator,
            crate::retry::DefaultErrorClassifier,
            config,
            creds,
            2,
            RetryPolicy::none(),
        );
        let stale = FakeConn { healthy: false, disconnected: false };
        pool.state.lock().await.available.push_back(stale);
        let conn = pool.acquire().await.unwrap();
        assert!(conn.is_healthy());
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_drains_available_and_fails_subsequent_acquire() {
        let (config, creds) = test_config();
        let pool = ConnectionPool::new(
            FakeFactory { created: Arc::new(AtomicUsize::new(0)) },
            FakeAuthenticator,
            crate::retry::DefaultErrorClassifier,
            config,
            creds,
            2,
            RetryPolicy::none(),
        );
        let conn = pool.acquire().await.unwrap();
        pool.release(conn).await;
        pool.close().await;
        assert!(pool.state.lock().await.available.is_empty());
        let err = pool.acquire().await;
        assert!(matches!(err, Err(ProtocolError::PoolClosed)));
    }

    #[tokio::test]
    async fn waiter_is_served_once_a_connection_is_released() {
        let (config, creds) = test_config();
        let pool = Arc::new(ConnectionPool::new(
            FakeFactory { created: Arc::new(AtomicUsize::new(0)) },
            FakeAuthenticator,
            crate::retry::DefaultErrorClassifier,
            config,
            creds,
            1,
            RetryPolicy::none(),
        ));
        let first = pool.acquire().await.unwrap();

        let waiter_pool = pool.clone();
        let waiter = tokio::spawn(async move { waiter_pool.acquire().await });
        tokio::task::yield_now().await;
        pool.release(first).await;
        let second = waiter.await.unwrap().unwrap();
        pool.release(second).await;
    }

    #[tokio::test]
    async fn waiters_are_served_in_ticket_order_not_arrival_after_wake() {
        let (config, creds) = test_config();
        let pool = Arc::new(ConnectionPool::new(
            FakeFactory { created: Arc::new(AtomicUsize::new(0)) },
            FakeAuthenticator,
            crate::retry::DefaultErrorClassifier,
            config,
            creds,
            1,
            RetryPolicy::none(),
        ));
        let held = pool.acquire().await.unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));

        let pool_a = pool.clone();
        let order_a = order.clone();
        let waiter_a = tokio::spawn(async move {
            let conn = pool_a.acquire().await.unwrap();
            order_a.lock().await.push('a');
            conn
        });
        tokio::task::yield_now().await;

        let pool_b = pool.clone();
        let order_b = order.clone();
        let waiter_b = tokio::spawn(async move {
            let conn = pool_b.acquire().await.unwrap();
            order_b.lock().await.push('b');
            conn
        });
        tokio::task::yield_now().await;

        // A late-arriving caller must not barge ahead of A or B, which were
        // already parked waiting for the single slot.
        pool.release(held).await;
        let a = waiter_a.await.unwrap();
        pool.release(a).await;
        let b = waiter_b.await.unwrap();
        pool.release(b).await;

        assert_eq!(*order.lock().await, vec!['a', 'b']);
    }

    #[tokio::test]
    async fn with_connection_releases_even_on_error() {
        let (config, creds) = test_config();
        let pool = ConnectionPool::new(
            FakeFactory { created: Arc::new(AtomicUsize::new(0)) },
            FakeAuthenticator,
            crate::retry::DefaultErrorClassifier,
            config,
            creds,
            1,
            RetryPolicy::none(),
        );
        let result: Result<(), ProtocolError> =
            pool.with_connection(|_conn| async { Err(ProtocolError::BadResponse("boom".to_string())) }).await;
        assert!(result.is_err());
        assert_eq!(pool.state.lock().await.available.len(), 1);
    }
}
