//! Deterministic in-memory `Transport` for tests (SPEC_FULL.md §8).
//!
//! Grounded on the mock/real split the teacher uses for its own I/O abstractions —
//! `examples/r3bl-org-r3bl-open-core/tui/src/core/test_fixtures/input_device_fixtures/
//! input_device_ext_mock.rs` provides `InputDevice::new_mock` backed by a scripted
//! generator rather than a real terminal. This records every write (for wire-format
//! assertions) and dispenses a scripted read queue, with an optional output-buffer
//! capacity so the backpressure property (§8, universal property 5) can be exercised.

use std::collections::VecDeque;

use super::Transport;

#[derive(Debug, Default)]
pub struct InMemoryTransport {
    written: Vec<u8>,
    pending_input: VecDeque<u8>,
    /// `None` means unbounded (writes always fully accepted, `out_waiting` stays 0).
    output_capacity: Option<usize>,
    output_level: usize,
    fail_next_write: bool,
    closed: bool,
    /// (trigger substring, line to queue) pairs checked against every `write()` call, in
    /// registration order. Models a controller that acks a command only once it has
    /// actually seen it on the wire, instead of a reply pre-staged before the command
    /// that provokes it was even sent.
    write_triggers: Vec<(String, String)>,
}

impl InMemoryTransport {
    pub fn new() -> Self { Self::default() }

    pub fn with_output_capacity(capacity: usize) -> Self {
        Self { output_capacity: Some(capacity), ..Self::default() }
    }

    /// Queue bytes the controller "sends back" on the next `read_available()` call(s).
    pub fn push_read(&mut self, bytes: &[u8]) {
        self.pending_input.extend(bytes.iter().copied());
    }

    pub fn push_read_line(&mut self, line: &str) {
        self.push_read(line.as_bytes());
        self.push_read(b"\n");
    }

    /// Everything ever written to this transport, for wire-format assertions.
    pub fn written(&self) -> &[u8] { &self.written }

    pub fn written_as_str(&self) -> String { String::from_utf8_lossy(&self.written).into_owned() }

    /// Simulate the controller draining `n` bytes out of the host's output buffer.
    pub fn drain_output(&mut self, n: usize) { self.output_level = self.output_level.saturating_sub(n); }

    pub fn fail_next_write(&mut self) { self.fail_next_write = true; }

    pub fn is_closed(&self) -> bool { self.closed }

    /// Queue `response_line` as soon as a future `write()` call's bytes contain
    /// `trigger`, rather than up front — so a scripted ack can't be drained before the
    /// command it acknowledges has actually been sent.
    pub fn respond_to_write(&mut self, trigger: &str, response_line: &str) {
        self.write_triggers.push((trigger.to_string(), response_line.to_string()));
    }
}

impl Transport for InMemoryTransport {
    fn in_waiting(&mut self) -> std::io::Result<usize> { Ok(self.pending_input.len()) }

    fn out_waiting(&mut self) -> std::io::Result<usize> { Ok(self.output_level) }

    fn read_available(&mut self) -> std::io::Result<Vec<u8>> {
        Ok(self.pending_input.drain(..).collect())
    }

    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        if self.fail_next_write {
            self.fail_next_write = false;
            return Err(std::io::Error::other("simulated transport write failure"));
        }
        let accepted = match self.output_capacity {
            None => bytes.len(),
            Some(capacity) => (capacity.saturating_sub(self.output_level)).min(bytes.len()),
        };
        self.written.extend_from_slice(&bytes[..accepted]);
        self.output_level += accepted;

        let written_chunk = String::from_utf8_lossy(&bytes[..accepted]).into_owned();
        let triggered: Vec<String> = self
            .write_triggers
            .iter()
            .filter(|(trigger, _)| written_chunk.contains(trigger.as_str()))
            .map(|(_, response)| response.clone())
            .collect();
        for response in triggered {
            self.push_read_line(&response);
        }

        Ok(accepted)
    }

    fn reset_output(&mut self) -> std::io::Result<()> {
        self.output_level = 0;
        Ok(())
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn write_accepted_up_to_capacity() {
        let mut transport = InMemoryTransport::with_output_capacity(4);
        assert_eq!(transport.write(b"hello").unwrap(), 4);
        assert_eq!(transport.out_waiting().unwrap(), 4);
        assert_eq!(transport.written(), b"hell");
    }

    #[test]
    fn drain_output_frees_capacity_for_subsequent_writes() {
        let mut transport = InMemoryTransport::with_output_capacity(4);
        transport.write(b"hell").unwrap();
        transport.drain_output(4);
        assert_eq!(transport.write(b"o").unwrap(), 1);
        assert_eq!(transport.written(), b"hello");
    }

    #[test]
    fn fail_next_write_surfaces_io_error_once() {
        let mut transport = InMemoryTransport::new();
        transport.fail_next_write();
        assert!(transport.write(b"x").is_err());
        assert_eq!(transport.write(b"y").unwrap(), 1);
    }

    #[test]
    fn respond_to_write_queues_a_read_only_after_the_trigger_is_sent() {
        let mut transport = InMemoryTransport::new();
        transport.respond_to_write("M110", "N0: OK");
        assert_eq!(transport.in_waiting().unwrap(), 0);

        transport.write(b"N0 M110 N0 *1\n").unwrap();

        assert_eq!(transport.in_waiting().unwrap(), "N0: OK\n".len());
        assert_eq!(transport.read_available().unwrap(), b"N0: OK\n");
    }
}
