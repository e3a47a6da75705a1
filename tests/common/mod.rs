//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use boardlink::{LogSink, StatusSink, Transport};

/// What the mock does with the next write.
#[derive(Debug)]
pub enum Script {
    /// Accept at most this many bytes.
    Accept(usize),
    /// Fail with this kind of error.
    Fail(io::ErrorKind),
}

#[derive(Debug, Default)]
pub struct Wire {
    pub writes: Vec<Vec<u8>>,
    pub script: VecDeque<Script>,
    pub closed: bool,
    pub fail_close: bool,
}

/// Transport recording every write. Clones share the same wire, so a test can
/// keep one to inspect what the link wrote.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    pub wire: Rc<RefCell<Wire>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Written chunks, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.wire.borrow().writes.clone()
    }

    /// Written chunks as text, for readable assertions.
    pub fn lines(&self) -> Vec<String> {
        self.writes()
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.writes().iter().map(Vec::len).collect()
    }

    pub fn script(&self, step: Script) {
        self.wire.borrow_mut().script.push_back(step);
    }

    /// Make `close` report an error, after closing anyway.
    pub fn fail_close(&self) {
        self.wire.borrow_mut().fail_close = true;
    }

    pub fn is_closed(&self) -> bool {
        self.wire.borrow().closed
    }
}

impl Transport for MockTransport {
    fn name(&self) -> String {
        "mock".into()
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let mut wire = self.wire.borrow_mut();
        let accepted = match wire.script.pop_front() {
            Some(Script::Fail(kind)) => return Err(io::Error::new(kind, "scripted failure")),
            Some(Script::Accept(limit)) => limit.min(bytes.len()),
            None => bytes.len(),
        };
        if accepted > 0 {
            wire.writes.push(bytes[..accepted].to_vec());
        }
        Ok(accepted)
    }

    fn close(&mut self) -> io::Result<()> {
        let mut wire = self.wire.borrow_mut();
        wire.closed = true;
        if wire.fail_close {
            return Err(io::Error::new(io::ErrorKind::Other, "close failed"));
        }
        Ok(())
    }
}

/// Status sink recording every update it is given.
#[derive(Debug, Clone, Default)]
pub struct StatusRecorder {
    pub updates: Rc<RefCell<Vec<(String, String)>>>,
}

impl StatusSink for StatusRecorder {
    fn update(&mut self, name: &str, value: &str) {
        self.updates
            .borrow_mut()
            .push((name.to_owned(), value.to_owned()));
    }
}

/// Log sink recording every line it is given.
#[derive(Debug, Clone, Default)]
pub struct LogRecorder {
    pub lines: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl LogSink for LogRecorder {
    fn append(&mut self, text: &[u8]) {
        self.lines.borrow_mut().push(text.to_vec());
    }
}
