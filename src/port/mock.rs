//! Scripted serial link for tests.
//!
//! The channel algorithms are defined over physical-read boundaries, so the
//! mock is scripted per physical read: each [`MockStep`] is what one
//! `read_bytes` call observes (a chunk of data, end-of-stream, or a
//! transport error). An exhausted script reads as end-of-stream, an idle
//! line.
//!
//! The mock is `Clone`; keep one clone as a controller to script steps and
//! inspect the write log after handing the other to a `PortHandle`.

use super::error::PortError;
use super::traits::SerialLink;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// What one physical read observes.
#[derive(Debug, Clone)]
pub enum MockStep {
    /// The read returns these bytes (possibly fewer if the buffer is
    /// smaller; the remainder carries over to the next read).
    Data(Vec<u8>),
    /// The read reports end-of-stream.
    Eof,
    /// The read fails with an I/O error of this kind.
    Error(std::io::ErrorKind),
}

impl MockStep {
    pub fn data(bytes: &[u8]) -> Self {
        Self::Data(bytes.to_vec())
    }

    pub fn eof() -> Self {
        Self::Eof
    }

    pub fn io_error(kind: std::io::ErrorKind) -> Self {
        Self::Error(kind)
    }
}

#[derive(Debug, Default)]
struct MockState {
    steps: VecDeque<MockStep>,
    write_log: Vec<Vec<u8>>,
    write_failure: Option<std::io::ErrorKind>,
    flush_count: usize,
    read_delay: Option<std::time::Duration>,
}

/// Scripted in-memory serial link.
#[derive(Clone)]
pub struct MockLink {
    path: String,
    state: Arc<Mutex<MockState>>,
}

impl MockLink {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Append steps to the read script.
    pub fn script(&self, steps: impl IntoIterator<Item = MockStep>) {
        self.state.lock().steps.extend(steps);
    }

    /// Make the next write fail with an I/O error of `kind`.
    pub fn fail_next_write(&self, kind: std::io::ErrorKind) {
        self.state.lock().write_failure = Some(kind);
    }

    /// Delay every read by `delay`, simulating a slow device.
    pub fn set_read_delay(&self, delay: std::time::Duration) {
        self.state.lock().read_delay = Some(delay);
    }

    /// Everything written so far, one entry per write call.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Number of flush calls observed.
    pub fn flush_count(&self) -> usize {
        self.state.lock().flush_count
    }

    /// Number of unconsumed script steps.
    pub fn remaining_steps(&self) -> usize {
        self.state.lock().steps.len()
    }

    /// True once every other clone (i.e. the one held by a handle) has been
    /// dropped. Valid when exactly one clone was handed out.
    pub fn is_dropped(&self) -> bool {
        Arc::strong_count(&self.state) == 1
    }
}

impl SerialLink for MockLink {
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let delay = self.state.lock().read_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let mut state = self.state.lock();
        match state.steps.pop_front() {
            Some(MockStep::Data(mut bytes)) => {
                let n = bytes.len().min(buffer.len());
                buffer[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    let rest = bytes.split_off(n);
                    state.steps.push_front(MockStep::Data(rest));
                }
                Ok(n)
            }
            Some(MockStep::Eof) | None => Err(PortError::EndOfStream),
            Some(MockStep::Error(kind)) => {
                Err(PortError::Read(std::io::Error::new(kind, "scripted error")))
            }
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        if let Some(kind) = state.write_failure.take() {
            return Err(PortError::Write(std::io::Error::new(
                kind,
                "scripted write failure",
            )));
        }
        state.write_log.push(data.to_vec());
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), PortError> {
        self.state.lock().flush_count += 1;
        Ok(())
    }

    fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for MockLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLink")
            .field("path", &self.path)
            .field("remaining_steps", &self.remaining_steps())
            .finish()
    }
}
