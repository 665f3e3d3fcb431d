/*
 * scenarios.rs
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

//! End-to-end scenario tests driving a whole session (not just one
//! decoder or parser in isolation) against a scripted, in-memory
//! `Transport`, one script per protocol.

use std::collections::VecDeque;

use tagliacarte_mail_core::imap::fetch::{FetchItem, FetchRequest};
use tagliacarte_mail_core::imap::session::ImapSession;
use tagliacarte_mail_core::pop3::session::Pop3Session;
use tagliacarte_mail_core::smtp::session::{EnvelopeParams, SmtpSession};
use tagliacarte_mail_core::uid::{SequenceSet, UniqueIdRange};
use tagliacarte_mail_core::Transport;

struct ScriptedTransport {
    reads: VecDeque<Vec<u8>>,
    writes: Vec<Vec<u8>>,
}

impl ScriptedTransport {
    fn new(chunks: Vec<&[u8]>) -> Self {
        Self { reads: chunks.into_iter().map(|c| c.to_vec()).collect(), writes: Vec::new() }
    }
}

impl Transport for ScriptedTransport {
    async fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.writes.push(bytes.to_vec());
        Ok(())
    }

    async fn read_chunk(&mut self) -> std::io::Result<Vec<u8>> {
        Ok(self.reads.pop_front().unwrap_or_default())
    }
}

#[tokio::test]
async fn imap_login_select_fetch_then_logout() {
    let greeting = b"* OK [CAPABILITY IMAP4rev1 IDLE UIDPLUS] dovecot ready\r\n".to_vec();
    let login_ok = b"A0001 OK LOGIN completed\r\n".to_vec();
    let select_resp = concat!(
        "* 3 EXISTS\r\n",
        "* OK [UIDVALIDITY 1] UIDs valid\r\n",
        "A0002 OK [READ-WRITE] SELECT completed\r\n",
    )
    .as_bytes()
    .to_vec();
    let fetch_resp = b"* 1 FETCH (UID 101 FLAGS (\\Seen))\r\nA0003 OK FETCH completed\r\n".to_vec();
    let logout_resp = b"* BYE logging out\r\nA0004 OK LOGOUT completed\r\n".to_vec();

    let transport = ScriptedTransport::new(vec![&greeting, &login_ok, &select_resp, &fetch_resp, &logout_resp]);
    let mut session = ImapSession::connect(transport).await.unwrap();
    assert!(session.capabilities().has("UIDPLUS"));

    session.login("tim", "tanstaaftanstaaf").await.unwrap();
    session.select("INBOX").await.unwrap();
    assert_eq!(session.selected().unwrap().message_count, 3);

    let mut set = SequenceSet::new();
    set.insert_range(UniqueIdRange::single(1));
    let request = FetchRequest::new().with(FetchItem::Uid).with(FetchItem::Flags);
    let fetched = session.fetch(&set, &request, false).await.unwrap();
    assert_eq!(fetched.len(), 1);

    session.logout().await.unwrap();
}

#[tokio::test]
async fn pop3_login_stat_retr_quit() {
    let greeting = b"+OK POP3 server ready\r\n".to_vec();
    let user_ok = b"+OK\r\n".to_vec();
    let pass_ok = b"+OK maildrop has 2 messages\r\n".to_vec();
    let stat_ok = b"+OK 2 320\r\n".to_vec();
    let retr_ok = b"+OK 120 octets\r\nSubject: hi\r\n\r\nhello\r\n.\r\n".to_vec();
    let quit_ok = b"+OK goodbye\r\n".to_vec();

    let transport = ScriptedTransport::new(vec![&greeting, &user_ok, &pass_ok, &stat_ok, &retr_ok, &quit_ok]);
    let mut session = Pop3Session::connect(transport).await.unwrap();
    session.login("mrose", "tanstaaf").await.unwrap();

    let stat = session.stat().await.unwrap();
    assert_eq!(stat.count, 2);
    assert_eq!(stat.total_size, 320);

    let body = session.retr(1).await.unwrap();
    assert_eq!(body.lines(), vec!["Subject: hi".to_string(), "".to_string(), "hello".to_string()]);

    session.quit().await.unwrap();
}

#[tokio::test]
async fn smtp_ehlo_auth_plain_then_submit() {
    let greeting = b"220 mail.example.com ESMTP ready\r\n".to_vec();
    let ehlo_resp = concat!(
        "250-mail.example.com Hello\r\n",
        "250-AUTH PLAIN LOGIN\r\n",
        "250-SIZE 35882577\r\n",
        "250 PIPELINING\r\n",
    )
    .as_bytes()
    .to_vec();
    let auth_ok = b"235 2.7.0 Authentication successful\r\n".to_vec();
    let mail_ok = b"250 OK\r\n".to_vec();
    let rcpt_ok = b"250 OK\r\n".to_vec();
    let data_go = b"354 Start mail input\r\n".to_vec();
    let data_ok = b"250 OK queued as 12345\r\n".to_vec();

    let transport =
        ScriptedTransport::new(vec![&greeting, &ehlo_resp, &auth_ok, &mail_ok, &rcpt_ok, &data_go, &data_ok]);
    let mut session = SmtpSession::connect(transport).await.unwrap();
    let caps = session.ehlo("client.example.com").await.unwrap();
    assert_eq!(caps.value("SIZE"), Some("35882577"));
    assert!(caps.has("PIPELINING"));

    session.authenticate_best("tim", "tanstaaftanstaaf", None).await.unwrap();

    let results = session
        .send_mail("a@x", &EnvelopeParams::new(), &["b@y"], &EnvelopeParams::new(), b"Hello\r\n")
        .await
        .unwrap();
    assert!(results[0].accepted);
}
