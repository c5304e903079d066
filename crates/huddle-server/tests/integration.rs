//! End-to-end tests over real loopback sockets.

#![allow(missing_docs)]

use std::time::Duration;

use huddle_core::{PALETTE, RESET};
use huddle_server::{ChatServer, ServerConfig, ServerHandle};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

const TIMEOUT: Duration = Duration::from_secs(5);
const PROMPT: &str = "Enter your name: ";

async fn boot_server() -> ServerHandle {
    let config = ServerConfig {
        listen_addr: "127.0.0.1:0".into(),
        ..ServerConfig::default()
    };
    ChatServer::bind(config).await.unwrap().spawn().unwrap()
}

struct TestClient {
    stream: BufReader<TcpStream>,
}

impl TestClient {
    /// Connect and consume the name prompt.
    async fn connect(handle: &ServerHandle) -> Self {
        let stream = TcpStream::connect(handle.local_addr()).await.unwrap();
        let mut client = Self {
            stream: BufReader::new(stream),
        };
        let mut prompt = vec![0u8; PROMPT.len()];
        timeout(TIMEOUT, client.stream.read_exact(&mut prompt))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(prompt, PROMPT.as_bytes());
        client
    }

    /// Connect, send `name`, and return the client with its own colored tag.
    async fn join(handle: &ServerHandle, name: &str) -> (Self, String) {
        let mut client = Self::connect(handle).await;
        client.send(name).await;
        let line = client.line().await;
        let tag = line
            .strip_prefix("*** ")
            .and_then(|l| l.strip_suffix(" joined the chat ***\n"))
            .unwrap_or_else(|| panic!("not a join line: {line:?}"))
            .to_owned();
        assert_colored(&tag, name);
        (client, tag)
    }

    async fn send(&mut self, text: &str) {
        let stream = self.stream.get_mut();
        stream.write_all(text.as_bytes()).await.unwrap();
        stream.write_all(b"\n").await.unwrap();
    }

    async fn line(&mut self) -> String {
        let mut line = String::new();
        let n = timeout(TIMEOUT, self.stream.read_line(&mut line))
            .await
            .expect("timed out waiting for a line")
            .unwrap();
        assert!(n > 0, "unexpected EOF");
        line
    }

    async fn expect_eof(&mut self) {
        let mut rest = Vec::new();
        let _ = timeout(TIMEOUT, self.stream.read_to_end(&mut rest))
            .await
            .expect("connection was not closed");
    }
}

fn assert_colored(tag: &str, name: &str) {
    let body = tag
        .strip_suffix(RESET)
        .unwrap_or_else(|| panic!("missing reset: {tag:?}"));
    let code = body
        .strip_suffix(name)
        .unwrap_or_else(|| panic!("missing name: {tag:?}"));
    assert!(
        PALETTE.iter().any(|c| c.code() == code),
        "color not in palette: {code:?}"
    );
}

#[tokio::test]
async fn first_client_sees_its_own_join() {
    let server = boot_server().await;
    let (_alice, tag) = TestClient::join(&server, "Alice").await;
    assert!(tag.contains("Alice"));
    assert_eq!(server.registry().names().await, vec!["Alice".to_owned()]);
}

#[tokio::test]
async fn two_clients_chat_with_self_echo() {
    let server = boot_server().await;
    let (mut alice, alice_tag) = TestClient::join(&server, "Alice").await;
    let (mut bob, bob_tag) = TestClient::join(&server, "Bob").await;

    assert_eq!(
        alice.line().await,
        format!("*** {bob_tag} joined the chat ***\n")
    );

    alice.send("hi").await;
    let expected = format!("{alice_tag}: hi\n");
    assert_eq!(alice.line().await, expected);
    assert_eq!(bob.line().await, expected);
}

#[tokio::test]
async fn departure_is_announced_and_peer_dropped() {
    let server = boot_server().await;
    let (alice, alice_tag) = TestClient::join(&server, "Alice").await;
    let (mut bob, bob_tag) = TestClient::join(&server, "Bob").await;

    drop(alice);
    assert_eq!(
        bob.line().await,
        format!("*** {alice_tag} left the chat ***\n")
    );
    assert_eq!(server.registry().names().await, vec!["Bob".to_owned()]);

    bob.send("still here").await;
    assert_eq!(bob.line().await, format!("{bob_tag}: still here\n"));
    assert_eq!(server.registry().session_count().await, 1);
}

#[tokio::test]
async fn abandoned_handshake_announces_nothing() {
    let server = boot_server().await;
    let (mut alice, alice_tag) = TestClient::join(&server, "Alice").await;

    let ghost = TestClient::connect(&server).await;
    drop(ghost);

    // Give the ghost's session time to notice; then the next line Alice sees
    // must be her own marker, not a join or leave.
    tokio::time::sleep(Duration::from_millis(100)).await;
    alice.send("marker").await;
    assert_eq!(alice.line().await, format!("{alice_tag}: marker\n"));
    assert_eq!(server.registry().len().await, 1);
}

#[tokio::test]
async fn shutdown_closes_every_client_and_returns() {
    let server = boot_server().await;
    let (mut alice, _) = TestClient::join(&server, "Alice").await;
    let (mut bob, _) = TestClient::join(&server, "Bob").await;
    let _ = alice.line().await;

    server.shutdown();
    alice.expect_eof().await;
    bob.expect_eof().await;

    let report = timeout(TIMEOUT, server.join()).await.unwrap().unwrap();
    assert_eq!(report.closed_connections, 2);
    assert!(report.drained);
}

#[tokio::test]
async fn shutdown_also_closes_handshaking_clients() {
    let server = boot_server().await;
    let mut ghost = TestClient::connect(&server).await;

    server.shutdown();
    ghost.expect_eof().await;
    let report = timeout(TIMEOUT, server.join()).await.unwrap().unwrap();
    assert_eq!(report.closed_connections, 1);
}

#[tokio::test]
async fn late_joiner_does_not_receive_earlier_messages() {
    let server = boot_server().await;
    let (mut alice, alice_tag) = TestClient::join(&server, "Alice").await;

    alice.send("before carol").await;
    assert_eq!(alice.line().await, format!("{alice_tag}: before carol\n"));

    // Carol's first broadcast line is her own join.
    let (_carol, _) = TestClient::join(&server, "Carol").await;
}

#[tokio::test]
async fn sequential_broadcasts_arrive_in_order_everywhere() {
    let server = boot_server().await;
    let (mut alice, alice_tag) = TestClient::join(&server, "Alice").await;
    let (mut bob, bob_tag) = TestClient::join(&server, "Bob").await;
    let _ = alice.line().await;

    alice.send("first").await;
    let first = format!("{alice_tag}: first\n");
    assert_eq!(bob.line().await, first);

    bob.send("second").await;
    let second = format!("{bob_tag}: second\n");
    assert_eq!(alice.line().await, first);
    assert_eq!(alice.line().await, second);
    assert_eq!(bob.line().await, second);
}

#[tokio::test]
async fn one_senders_lines_keep_their_order() {
    let server = boot_server().await;
    let (mut alice, alice_tag) = TestClient::join(&server, "Alice").await;
    let (mut bob, _) = TestClient::join(&server, "Bob").await;
    let _ = alice.line().await;

    for i in 0..50 {
        alice.send(&format!("msg {i}")).await;
    }
    for i in 0..50 {
        assert_eq!(bob.line().await, format!("{alice_tag}: msg {i}\n"));
    }
}

#[tokio::test]
async fn crlf_clients_are_understood() {
    let server = boot_server().await;
    let mut client = TestClient::connect(&server).await;
    client
        .stream
        .get_mut()
        .write_all(b"Dana\r\nhello\r\n")
        .await
        .unwrap();

    let joined = client.line().await;
    assert!(joined.ends_with(&format!("Dana{RESET} joined the chat ***\n")));
    let said = client.line().await;
    assert!(said.ends_with(&format!("Dana{RESET}: hello\n")));
}
