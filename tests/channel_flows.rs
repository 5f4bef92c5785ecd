//! Channel behavior against simulated devices.
//!
//! Exercises the per-mode read/accumulate/terminate algorithms through the
//! public API with scripted mock links; no hardware involved.

mod common;

use common::{generic_channel, handle_for, scripted_link, MOCK_PATH};
use pretty_assertions::assert_eq;
use std::io::ErrorKind;
use std::sync::Arc;
use uart_device_agent::channel::GenericChannel;
use uart_device_agent::error::DriverError;
use uart_device_agent::port::{MockLink, MockStep, PortError};

#[test]
fn generic_read_concatenates_physical_reads_in_order() {
    let mock = scripted_link(&[b"a-first", b"b-second"]);
    let channel = generic_channel(&mock);

    let data = channel.read(64).unwrap();
    assert_eq!(data, b"a-firstb-second");
}

#[test]
fn generic_read_consumes_the_buffer_exactly_once() {
    let mock = scripted_link(&[b"payload"]);
    let channel = generic_channel(&mock);

    assert_eq!(channel.read(64).unwrap(), b"payload");
    // The line is quiet now; a second logical read starts from empty.
    assert_eq!(channel.read(64).unwrap(), b"");
}

#[test]
fn generic_read_error_preserves_accumulated_bytes() {
    let mock = MockLink::new(MOCK_PATH);
    mock.script([
        MockStep::data(b"kept"),
        MockStep::io_error(ErrorKind::BrokenPipe),
    ]);
    let channel = generic_channel(&mock);

    let err = channel.read(64).unwrap_err();
    assert!(matches!(err, DriverError::Port(PortError::Read(_))));
    // The port was flushed on the error path.
    assert_eq!(mock.flush_count(), 1);

    mock.script([MockStep::eof()]);
    assert_eq!(channel.read(64).unwrap(), b"kept");
}

#[test]
fn overlapping_generic_reads_drop_the_second_request() {
    let mock = MockLink::new(MOCK_PATH);
    let channel = Arc::new(generic_channel(&mock));

    // A slow device: each of the 64 physical reads takes 5 ms, so the first
    // logical read stays in flight long enough to observe the overlap.
    mock.set_read_delay(std::time::Duration::from_millis(5));
    mock.script((0..64).map(|_| MockStep::data(&[0u8; 16])));
    mock.script([MockStep::eof()]);
    let total_steps = mock.remaining_steps();

    let reader = {
        let channel = Arc::clone(&channel);
        std::thread::spawn(move || channel.read(1024))
    };

    // Once the reader has consumed a step it holds the channel lock and
    // keeps it for the remaining ~300 ms of scripted reads.
    while mock.remaining_steps() == total_steps {
        std::thread::yield_now();
    }

    match channel.read(1024) {
        Err(DriverError::DeviceBusy(device)) => assert_eq!(device, MOCK_PATH),
        other => panic!("expected busy drop, got {other:?}"),
    }

    // The dropped request did not disturb the in-flight accumulation.
    let in_flight = reader.join().unwrap().unwrap();
    assert_eq!(in_flight.len(), 1024);
}

#[test]
fn generic_write_does_not_disturb_pending_reads() {
    let mock = scripted_link(&[b"reply"]);
    let channel = generic_channel(&mock);

    channel.write(b"query").unwrap();
    assert_eq!(mock.write_log(), vec![b"query".to_vec()]);
    assert_eq!(channel.read(64).unwrap(), b"reply");
}

#[test]
fn closed_channel_reports_unavailable() {
    let mock = scripted_link(&[b"late"]);
    let channel = generic_channel(&mock);

    channel.close();
    assert!(matches!(
        channel.read(64).unwrap_err(),
        DriverError::Port(PortError::Unavailable(_))
    ));
    assert!(matches!(
        channel.write(b"x").unwrap_err(),
        DriverError::Port(PortError::Unavailable(_))
    ));
}

#[test]
fn echo_round_trip_over_a_fresh_handle() {
    // A device that echoes what it was sent: write then drain reads back
    // the same bytes.
    let sent: &[u8] = b"\x01\x02\x03echo";
    let mock = MockLink::new(MOCK_PATH);
    mock.script([MockStep::data(sent), MockStep::eof()]);

    let mut handle = handle_for(&mock);
    handle.write(sent).unwrap();

    let mut echoed = Vec::new();
    loop {
        match handle.read(16) {
            Ok(chunk) => echoed.extend_from_slice(&chunk),
            Err(PortError::EndOfStream) => break,
            Err(err) => panic!("unexpected read error: {err}"),
        }
    }
    handle.close();

    assert_eq!(mock.write_log(), vec![sent.to_vec()]);
    assert_eq!(echoed, sent);
    assert!(mock.is_dropped());
}

#[test]
fn reused_channel_keeps_its_handle_across_operations() {
    let mock = MockLink::new(MOCK_PATH);
    let channel = GenericChannel::with_handle(MOCK_PATH, handle_for(&mock));

    mock.script([MockStep::data(b"one"), MockStep::eof()]);
    assert_eq!(channel.read(16).unwrap(), b"one");

    mock.script([MockStep::data(b"two"), MockStep::eof()]);
    assert_eq!(channel.read(16).unwrap(), b"two");

    // Same underlying link the whole time.
    assert!(!mock.is_dropped());
    assert!(channel.is_connected());
}
