use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::*;
use crate::protocol::Response;
use crate::protocol::Status;

fn echo_transport(shift_opaque: u32) -> MockTransport {
    let codec = Codec::default();
    let mut transport = MockTransport::new();
    transport.expect_send().returning(move |raw| {
        let frame = codec.decode_request(&raw).unwrap();
        Ok(codec
            .encode_response(ResponseFrame {
                opaque: frame.opaque.wrapping_add(shift_opaque),
                status: Status::Success,
                body: Response::Empty,
            })
            .unwrap())
    });
    transport
}

fn get(key: &str) -> Request {
    Request::Get { key: key.into() }
}

#[tokio::test]
async fn test_round_trip_returns_matching_response() {
    let channel = RequestChannel::new(Arc::new(echo_transport(0)), Codec::default());

    let first = channel.round_trip(get("a"), Duration::from_secs(1)).await.unwrap();
    let second = channel.round_trip(get("b"), Duration::from_secs(1)).await.unwrap();

    assert_eq!(first.status, Status::Success);
    assert_ne!(first.opaque, second.opaque);
}

#[tokio::test]
async fn test_round_trip_rejects_foreign_opaque() {
    let channel = RequestChannel::new(Arc::new(echo_transport(1)), Codec::default());

    let result = channel.round_trip(get("a"), Duration::from_secs(1)).await;
    assert!(matches!(result, Err(RoundTripError::Frame(Error::Protocol(_)))));
}

#[tokio::test]
async fn test_transport_error_is_passed_through() {
    let mut transport = MockTransport::new();
    transport.expect_send().times(1).returning(|_| {
        Err(TransportError::ConnectionClosed {
            sent: true,
            reason: "reset by peer".into(),
        })
    });
    let channel = RequestChannel::new(Arc::new(transport), Codec::default());

    match channel.round_trip(get("a"), Duration::from_secs(1)).await {
        Err(RoundTripError::Transport(e)) => assert!(e.request_may_have_been_applied()),
        other => panic!("unexpected result {other:?}"),
    }
}

struct StalledTransport;

#[async_trait]
impl Transport for StalledTransport {
    async fn send(
        &self,
        _request: Bytes,
    ) -> std::result::Result<Bytes, TransportError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(TransportError::TemporaryFailure)
    }
}

#[tokio::test(start_paused = true)]
async fn test_attempt_timeout_counts_as_sent() {
    let channel = RequestChannel::new(Arc::new(StalledTransport), Codec::default());

    let result = channel.round_trip(get("a"), Duration::from_millis(50)).await;
    match result {
        Err(RoundTripError::Transport(TransportError::TimedOut { sent })) => assert!(sent),
        other => panic!("unexpected result {other:?}"),
    }
}

#[tokio::test]
async fn test_garbage_response_is_a_frame_error() {
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .returning(|_| Ok(Bytes::from_static(&[0x81, 0xff, 0xff])));
    let channel = RequestChannel::new(Arc::new(transport), Codec::default());

    let result = channel.round_trip(get("a"), Duration::from_secs(1)).await;
    assert!(matches!(result, Err(RoundTripError::Frame(_))));
}
