use std::time::Duration;

use tokio::io::duplex;
use yare::parameterized;

use super::*;
use crate::{Request, Response, ResponseStatus};

fn short_timeout() -> Duration {
    Duration::from_secs(5)
}

#[tokio::test]
async fn read_write_message_roundtrip() {
    let req = Request { action: "STATUS".into(), sid: "S-1".into(), config_path: None };
    let mut buffer = Vec::new();
    write_message(&mut buffer, &req, short_timeout()).await.expect("write failed");

    assert_eq!(u32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize, buffer.len() - 4);

    let mut cursor = std::io::Cursor::new(buffer);
    let back: Request = read_message(&mut cursor, short_timeout()).await.expect("read failed");
    assert_eq!(back, req);
}

#[tokio::test]
async fn read_message_matches_fields_case_insensitively() {
    let raw = br#"{"ACTION":"register","Sid":"S-1","CONFIGPATH":"/x/cfg.json"}"#;
    let mut buffer = Vec::new();
    let len = (raw.len() as u32).to_le_bytes();
    buffer.extend_from_slice(&len);
    buffer.extend_from_slice(raw);

    let mut cursor = std::io::Cursor::new(buffer);
    let req: Request = read_message(&mut cursor, short_timeout()).await.expect("read failed");
    assert_eq!(req.action, "register");
    assert_eq!(req.sid, "S-1");
    assert_eq!(req.config_path.as_deref(), Some("/x/cfg.json"));
}

#[parameterized(
    zero_length = { 0u32 },
    over_max = { 8193u32 },
)]
fn boundary_length_prefix(len: u32) {
    tokio_test_block_on(async move {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&len.to_le_bytes());
        buffer.extend_from_slice(&vec![b'x'; len as usize]);
        let mut cursor = std::io::Cursor::new(buffer);
        let result: Result<Request, ProtocolError> = read_message(&mut cursor, short_timeout()).await;
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    });
}

#[tokio::test]
async fn exactly_max_frame_size_is_accepted() {
    let padding = "x".repeat(MAX_FRAME_BYTES - 40);
    let req = Request { action: "STATUS".into(), sid: padding, config_path: None };
    let mut buffer = Vec::new();
    write_message(&mut buffer, &req, short_timeout()).await.expect("write failed");
    assert!(buffer.len() - 4 <= MAX_FRAME_BYTES);
}

#[tokio::test]
async fn write_message_rejects_oversized_payload() {
    let req = Request { action: "STATUS".into(), sid: "x".repeat(MAX_FRAME_BYTES), config_path: None };
    let mut buffer = Vec::new();
    let result = write_message(&mut buffer, &req, short_timeout()).await;
    assert!(matches!(result, Err(ProtocolError::Malformed(_))));
}

#[tokio::test]
async fn read_message_reports_end_of_stream_on_immediate_close() {
    let (mut client, server) = duplex(64);
    drop(server);
    let result: Result<Request, ProtocolError> = read_message(&mut client, short_timeout()).await;
    assert!(matches!(result, Err(ProtocolError::EndOfStream)));
}

#[tokio::test]
async fn read_message_times_out_when_peer_sends_nothing() {
    let (mut client, _server) = duplex(64);
    let result: Result<Request, ProtocolError> =
        read_message(&mut client, Duration::from_millis(20)).await;
    assert!(matches!(result, Err(ProtocolError::Timeout(_))));
}

#[tokio::test]
async fn full_duplex_round_trip_over_socketpair_like_stream() {
    let (mut a, mut b) = duplex(4096);
    let resp = Response::success_final("Registered: Yes");
    write_message(&mut a, &resp, short_timeout()).await.unwrap();
    let back: Response = read_message(&mut b, short_timeout()).await.unwrap();
    assert_eq!(back.status, ResponseStatus::Success);
    assert_eq!(back, resp);
}

fn tokio_test_block_on<F: std::future::Future<Output = ()>>(fut: F) {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
        .block_on(fut);
}
