//! Numbered rendezvous ports.
//!
//! A [`Port`] is a zero-capacity channel: a send blocks until some holder of
//! the same channel receives. Wiring two processors together is just cloning
//! one processor's `Port` into the other's table, so either side may send or
//! receive on it.

use crossbeam_channel::{bounded, Receiver, RecvError, SendError, Sender};

pub const PORT_COUNT: usize = 5;

#[derive(Clone)]
pub struct Port {
    writer: Sender<String>,
    reader: Receiver<String>,
}

impl Default for Port {
    fn default() -> Self {
        Self::rendezvous()
    }
}

impl Port {
    pub fn rendezvous() -> Self {
        let (writer, reader) = bounded(0);
        Self { writer, reader }
    }

    /// A port with no counterpart: every send and receive fails at once.
    pub fn closed() -> Self {
        let (writer, _) = bounded(0);
        let (_, reader) = bounded(0);
        Self { writer, reader }
    }

    /// Blocks until a receiver takes `text`.
    pub fn send(&self, text: String) -> Result<(), SendError<String>> {
        self.writer.send(text)
    }

    /// Blocks until a sender produces a line.
    pub fn recv(&self) -> Result<String, RecvError> {
        self.reader.recv()
    }

    pub fn writer(&self) -> Sender<String> {
        self.writer.clone()
    }

    pub fn reader(&self) -> Receiver<String> {
        self.reader.clone()
    }

    /// True when both handles refer to the same channel.
    pub fn same_channel(&self, other: &Port) -> bool {
        self.writer.same_channel(&other.writer)
    }
}

/// Canonical decimal text for a value crossing a port.
pub fn encode_value(value: f64) -> String {
    value.to_string()
}

pub fn decode_value(text: &str) -> Option<f64> {
    text.trim().parse().ok()
}
