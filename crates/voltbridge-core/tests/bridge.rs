//! End-to-end bridge behavior over an in-memory duplex link
//!
//! The "sensor" side of the duplex stream plays the firmware: it receives
//! keystrokes and can emit telemetry frames. Timing tests run under paused
//! tokio time.

use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

use voltbridge_core::bridge::{build_bridge, BridgeConfig, Dispatcher, ReceiveLoop};
use voltbridge_core::message::OutboundMessage;
use voltbridge_core::protocol::encode_frame;

type Bridge = (
    ReceiveLoop<tokio::io::ReadHalf<DuplexStream>, tokio::io::WriteHalf<DuplexStream>>,
    Dispatcher<tokio::io::WriteHalf<DuplexStream>>,
);

fn setup() -> (Bridge, DuplexStream, mpsc::Receiver<OutboundMessage>) {
    let (gateway_side, sensor_side) = tokio::io::duplex(1024);
    let (outbound_tx, outbound_rx) = mpsc::channel(32);
    let bridge = build_bridge(&BridgeConfig::default(), gateway_side, outbound_tx);
    (bridge, sensor_side, outbound_rx)
}

async fn read_bytes(sensor: &mut DuplexStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    sensor.read_exact(&mut buf).await.expect("sensor read");
    buf
}

#[tokio::test(start_paused = true)]
async fn startup_kick_then_frame_becomes_telemetry() {
    let ((rx_loop, _dispatcher), mut sensor, mut outbound) = setup();
    let loop_handle = tokio::spawn(rx_loop.run());

    // The loop kicks the sensor once on startup
    assert_eq!(read_bytes(&mut sensor, 1).await, vec![b'A']);

    sensor.write_all(&encode_frame(2.5, 2)).await.unwrap();

    let message = outbound.recv().await.expect("telemetry message");
    match message {
        OutboundMessage::Telemetry(post) => {
            assert_eq!(post.id, "1");
            assert_eq!(post.version, "1.0");
            assert!((post.params.voltage.value - 2.5).abs() < 1e-6);
            assert_eq!(post.params.pga.value, 2);
        }
        other => panic!("expected telemetry, got {:?}", other),
    }

    loop_handle.abort();
}

#[tokio::test(start_paused = true)]
async fn gain_request_sends_full_sequence_and_ack() {
    let ((_rx_loop, dispatcher), mut sensor, mut outbound) = setup();

    dispatcher
        .handle_request(br#"{"id":"5","version":"1.0","params":{"pga":64}}"#)
        .await
        .unwrap();

    assert_eq!(read_bytes(&mut sensor, 3).await, vec![b'C', b'1', b'2']);

    match outbound.recv().await.expect("reply") {
        OutboundMessage::Reply(reply) => {
            assert_eq!(reply.id, "5");
            assert_eq!(reply.code, 200);
            assert_eq!(reply.msg, "success");
        }
        other => panic!("expected reply, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn rate_request_sends_menu_and_value() {
    let ((_rx_loop, dispatcher), mut sensor, _outbound) = setup();

    dispatcher
        .handle_request(br#"{"id":"6","params":{"mode":3}}"#)
        .await
        .unwrap();

    assert_eq!(read_bytes(&mut sensor, 2).await, vec![b'F', b'3']);
}

#[tokio::test(start_paused = true)]
async fn invalid_gain_writes_nothing_but_other_fields_process() {
    let ((_rx_loop, dispatcher), mut sensor, mut outbound) = setup();

    dispatcher
        .handle_request(br#"{"id":"7","params":{"pga":7,"enable":false}}"#)
        .await
        .unwrap();

    // Only the stop byte from the enable field hits the wire
    assert_eq!(read_bytes(&mut sensor, 1).await, vec![b'S']);
    let mut probe = [0u8; 1];
    let quiet = tokio::time::timeout(Duration::from_millis(50), sensor.read(&mut probe)).await;
    assert!(quiet.is_err(), "unexpected extra bytes on the wire");

    // And the request is still acknowledged
    match outbound.recv().await.expect("reply") {
        OutboundMessage::Reply(reply) => {
            assert_eq!(reply.id, "7");
            assert_eq!(reply.code, 200);
        }
        other => panic!("expected reply, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn negative_gain_level_skipped_but_request_still_acked() {
    let ((_rx_loop, dispatcher), mut sensor, mut outbound) = setup();

    dispatcher
        .handle_request(br#"{"id":"11","params":{"pga":-1,"enable":false}}"#)
        .await
        .unwrap();

    assert_eq!(read_bytes(&mut sensor, 1).await, vec![b'S']);
    let mut probe = [0u8; 1];
    let quiet = tokio::time::timeout(Duration::from_millis(50), sensor.read(&mut probe)).await;
    assert!(quiet.is_err(), "unexpected extra bytes on the wire");

    match outbound.recv().await.expect("reply") {
        OutboundMessage::Reply(reply) => {
            assert_eq!(reply.id, "11");
            assert_eq!(reply.code, 200);
        }
        other => panic!("expected reply, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn unparseable_request_dropped_without_reply() {
    let ((_rx_loop, dispatcher), _sensor, mut outbound) = setup();

    dispatcher.handle_request(b"{not json").await.unwrap();
    dispatcher.handle_request(b"").await.unwrap();

    assert!(outbound.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn quiet_line_triggers_exactly_one_retry_per_window() {
    let ((rx_loop, _dispatcher), mut sensor, _outbound) = setup();
    let loop_handle = tokio::spawn(rx_loop.run());

    // Startup kick
    assert_eq!(read_bytes(&mut sensor, 1).await, vec![b'A']);

    // With the sensor silent the supervisor retries once per idle window
    assert_eq!(read_bytes(&mut sensor, 1).await, vec![b'A']);
    assert_eq!(read_bytes(&mut sensor, 1).await, vec![b'A']);

    loop_handle.abort();
}

#[tokio::test(start_paused = true)]
async fn disable_request_stops_supervisor_retries() {
    let ((rx_loop, dispatcher), mut sensor, mut outbound) = setup();
    let loop_handle = tokio::spawn(rx_loop.run());

    assert_eq!(read_bytes(&mut sensor, 1).await, vec![b'A']);

    dispatcher
        .handle_request(br#"{"id":"8","params":{"enable":false}}"#)
        .await
        .unwrap();
    assert_eq!(read_bytes(&mut sensor, 1).await, vec![b'S']);
    match outbound.recv().await.expect("reply") {
        OutboundMessage::Reply(reply) => assert_eq!(reply.id, "8"),
        other => panic!("expected reply, got {:?}", other),
    }

    // No retry shows up even well past the idle threshold
    let mut probe = [0u8; 1];
    let quiet = tokio::time::timeout(Duration::from_secs(10), sensor.read(&mut probe)).await;
    assert!(quiet.is_err(), "supervisor retried while disabled");

    loop_handle.abort();
}

#[tokio::test(start_paused = true)]
async fn concurrent_gain_requests_never_interleave_on_the_wire() {
    let ((_rx_loop, dispatcher), mut sensor, _outbound) = setup();

    let first = dispatcher.clone();
    let second = dispatcher.clone();
    let (ra, rb) = tokio::join!(
        first.handle_request(br#"{"id":"a","params":{"pga":1}}"#),
        second.handle_request(br#"{"id":"b","params":{"pga":128}}"#),
    );
    ra.unwrap();
    rb.unwrap();

    let written = read_bytes(&mut sensor, 6).await;
    let x1 = [b'C', b'1', b'0'];
    let x128 = [b'C', b'1', b'3'];
    let ordered_one_way = written[..3] == x1 && written[3..] == x128;
    let ordered_other_way = written[..3] == x128 && written[3..] == x1;
    assert!(
        ordered_one_way || ordered_other_way,
        "sequences interleaved: {:?}",
        written
    );
}
