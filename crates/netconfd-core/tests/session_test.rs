#![allow(clippy::unwrap_used)]

mod common;

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use common::{FakePrincipal, Harness, ok_reply};
use netconfd_core::{CoreError, SessionState, session};

const CLIENT_HELLO: &str = r#"<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><capabilities><capability>urn:ietf:params:netconf:base:1.1</capability></capabilities></hello>]]>]]>"#;

/// Read until `marker` has been seen `count` times.
async fn read_until(client: &mut DuplexStream, marker: &str, count: usize) -> String {
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    while String::from_utf8_lossy(&out).matches(marker).count() < count {
        let n = tokio::time::timeout(Duration::from_secs(5), client.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert!(n > 0, "server closed early: {}", String::from_utf8_lossy(&out));
        out.extend_from_slice(&buf[..n]);
    }
    String::from_utf8(out).unwrap()
}

fn chunk(reply: &str) -> String {
    format!("\n#{}\n{reply}\n##\n", reply.len())
}

#[tokio::test]
async fn hello_then_mixed_framing() {
    let h = Harness::new();
    let (state, calls) = h.session();
    let session_id = state.id;
    let (mut client, server) = tokio::io::duplex(16 * 1024);
    let router = h.router.clone();
    let task = tokio::spawn(async move { session::run(&router, state, server).await });

    let hello = read_until(&mut client, "]]>]]>", 1).await;
    assert!(hello.starts_with("<hello xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\">"));
    assert!(hello.contains("sonic-port?module=sonic-port&amp;revision=2019-07-01"));
    assert!(hello.contains(&format!("<session-id>{session_id}</session-id>")));

    client.write_all(CLIENT_HELLO.as_bytes()).await.unwrap();

    // One end-of-message framed request, then one chunked request split
    // across two writes.
    client
        .write_all(br#"<rpc message-id="1"><commit/></rpc>]]>]]>"#)
        .await
        .unwrap();
    let second = r#"<rpc message-id="2"><commit/></rpc>"#;
    let framed = format!("\n#{}\n{second}\n##\n", second.len());
    let (head, tail) = framed.split_at(10);
    client.write_all(head.as_bytes()).await.unwrap();
    client.flush().await.unwrap();
    tokio::task::yield_now().await;
    client.write_all(tail.as_bytes()).await.unwrap();

    let replies = read_until(&mut client, "\n##\n", 2).await;
    assert_eq!(replies, format!("{}{}", chunk(&ok_reply("1")), chunk(&ok_reply("2"))));

    drop(client);
    task.await.unwrap().unwrap();
    assert!(calls.lock().unwrap().iter().any(|c| c == "release"));
}

#[tokio::test]
async fn bad_hello_ends_the_session() {
    let h = Harness::new();
    let (state, _) = h.session();
    let (mut client, server) = tokio::io::duplex(16 * 1024);
    let router = h.router.clone();
    let task = tokio::spawn(async move { session::run(&router, state, server).await });

    read_until(&mut client, "]]>]]>", 1).await;
    client
        .write_all(br#"<rpc message-id="1"><commit/></rpc>]]>]]>"#)
        .await
        .unwrap();

    let reply = read_until(&mut client, "\n##\n", 1).await;
    assert!(reply.contains(r#"message-id="1""#));
    assert!(reply.contains("Invalid client capabilities, exiting"));

    let result = task.await.unwrap();
    assert!(matches!(result, Err(CoreError::InvalidHello)));
    assert!(h.persistence.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn trailing_message_at_eof_is_processed() {
    let h = Harness::new();
    let calls = common::CallLog::default();
    let state = SessionState::new(Box::new(FakePrincipal::allow_all(calls)));
    let (mut client, server) = tokio::io::duplex(16 * 1024);
    let router = h.router.clone();
    let task = tokio::spawn(async move { session::run(&router, state, server).await });

    read_until(&mut client, "]]>]]>", 1).await;
    client.write_all(CLIENT_HELLO.as_bytes()).await.unwrap();
    client
        .write_all(br#"<rpc message-id="9"><commit/></rpc>"#)
        .await
        .unwrap();
    client.shutdown().await.unwrap();

    let reply = read_until(&mut client, "\n##\n", 1).await;
    assert_eq!(reply, chunk(&ok_reply("9")));
    task.await.unwrap().unwrap();
    assert_eq!(*h.persistence.calls.lock().unwrap(), ["save"]);
}
