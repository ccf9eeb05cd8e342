//! ---
//! mcs_section: "05-networking-external-interfaces"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Network connectivity to the managed game server."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
use std::time::Duration;

use bytes::{Buf, BytesMut};
use mcs_net::codec;
use mcs_net::{JavaStatusClient, ProbeError};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Loopback server answering one status exchange with `reply` as packet `packet_id`.
async fn fake_server(packet_id: i32, reply: String) -> (u16, JoinHandle<(String, u16)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut handshake = codec::read_frame(&mut socket).await.expect("handshake");
        assert_eq!(codec::get_varint(&mut handshake).unwrap(), 0x00);
        let _protocol = codec::get_varint(&mut handshake).unwrap();
        let host = codec::get_string(&mut handshake).unwrap();
        let port = handshake.get_u16();
        assert_eq!(codec::get_varint(&mut handshake).unwrap(), 1);

        let mut request = codec::read_frame(&mut socket).await.expect("status request");
        assert_eq!(codec::get_varint(&mut request).unwrap(), 0x00);

        let mut body = BytesMut::new();
        codec::put_string(&mut body, &reply);
        socket
            .write_all(&codec::frame(packet_id, &body))
            .await
            .expect("write reply");
        (host, port)
    });
    (port, handle)
}

#[tokio::test]
async fn query_reports_online_players() {
    let reply = r#"{"version":{"name":"1.20.4","protocol":765},"players":{"online":3,"max":20},"description":{"text":"A Minecraft Server"}}"#;
    let (port, server) = fake_server(0x00, reply.to_owned()).await;

    let client = JavaStatusClient::new(Duration::from_secs(2));
    let status = client.query("127.0.0.1", port).await.expect("status");
    assert_eq!(status.online_players(), 3);
    assert_eq!(status.players.max, 20);
    assert_eq!(status.version.expect("version").protocol, 765);

    let (host, announced_port) = server.await.expect("server task");
    assert_eq!(host, "127.0.0.1");
    assert_eq!(announced_port, port);
}

#[tokio::test]
async fn refused_connection_is_connectivity_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);

    let client = JavaStatusClient::new(Duration::from_secs(2));
    let err = client.query("127.0.0.1", port).await.unwrap_err();
    assert!(err.is_connectivity(), "unexpected error: {err}");
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.expect("accept");
        tokio::time::sleep(Duration::from_millis(500)).await;
        drop(socket);
    });

    let client = JavaStatusClient::new(Duration::from_millis(100));
    let err = client.query("127.0.0.1", port).await.unwrap_err();
    assert!(matches!(err, ProbeError::Timeout { .. }));
    assert!(err.is_connectivity());
    server.await.expect("server task");
}

#[tokio::test]
async fn garbage_payload_is_not_connectivity() {
    let (port, server) = fake_server(0x00, "not json".to_owned()).await;
    let client = JavaStatusClient::new(Duration::from_secs(2));
    let err = client.query("127.0.0.1", port).await.unwrap_err();
    assert!(matches!(err, ProbeError::Payload(_)));
    assert!(!err.is_connectivity());
    server.await.expect("server task");
}

#[tokio::test]
async fn unexpected_packet_id_is_protocol_error() {
    let (port, server) = fake_server(0x01, "{}".to_owned()).await;
    let client = JavaStatusClient::new(Duration::from_secs(2));
    let err = client.query("127.0.0.1", port).await.unwrap_err();
    assert!(matches!(err, ProbeError::Protocol(_)));
    server.await.expect("server task");
}
