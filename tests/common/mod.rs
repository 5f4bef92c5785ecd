//! Shared test utilities.
//!
//! Builders around the scripted mock link so tests can wire channels to
//! simulated devices without hardware.

#![allow(dead_code)]

use std::time::Duration;
use uart_device_agent::channel::GenericChannel;
use uart_device_agent::port::{MockLink, MockStep, PortConfig, PortHandle, SerialLink};

pub const MOCK_PATH: &str = "/dev/ttyMOCK";

/// A mock link scripted with one data chunk per entry, ending in
/// end-of-stream.
pub fn scripted_link(chunks: &[&[u8]]) -> MockLink {
    let mock = MockLink::new(MOCK_PATH);
    mock.script(chunks.iter().map(|c| MockStep::data(c)));
    mock.script([MockStep::eof()]);
    mock
}

/// Wrap a mock link in a handle the way a channel would own a real port.
pub fn handle_for(mock: &MockLink) -> PortHandle {
    let config = PortConfig::new(mock.path(), 9600, Duration::from_millis(10));
    PortHandle::from_link(config, Box::new(mock.clone()))
}

/// A generic channel driven entirely by a mock link.
pub fn generic_channel(mock: &MockLink) -> GenericChannel {
    GenericChannel::with_handle(MOCK_PATH, handle_for(mock))
}
