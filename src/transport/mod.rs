//! Transport capability set (SPEC_FULL.md §6, §9).
//!
//! Design note §9 calls for a single capability trait rather than a real/virtual class
//! hierarchy; grounded on the teacher's own preference for trait objects over
//! inheritance (`InputDeviceExt`/`OutputDevice` in
//! `examples/r3bl-org-r3bl-open-core/tui/src/core/terminal_io/input_device_ext.rs`, and
//! the mock/real split in `.../test_fixtures/input_device_fixtures/
//! input_device_ext_mock.rs`). `serial.rs` is the real implementation, `memory.rs` is the
//! deterministic test double used throughout `tests/`.

pub mod memory;
pub mod serial;

/// One serial port candidate as reported by device enumeration (§4.5, §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub path: String,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub serial_number: Option<String>,
}

/// A duplex byte stream with non-blocking buffer introspection.
///
/// All methods are synchronous: callers (the Session, via the Worker's task) are
/// expected to call these from inside a `tokio::task` and yield cooperatively between
/// calls rather than relying on the trait itself to be async (most concrete transports,
/// including `serialport`, are blocking-with-timeout under the hood).
pub trait Transport: Send {
    /// Bytes currently buffered and ready to read without blocking.
    fn in_waiting(&mut self) -> std::io::Result<usize>;

    /// Bytes currently queued in the transport's own write buffer.
    fn out_waiting(&mut self) -> std::io::Result<usize>;

    /// Read whatever is currently available without blocking past `in_waiting()` bytes.
    fn read_available(&mut self) -> std::io::Result<Vec<u8>>;

    /// Write `bytes`, returning how many were accepted. May write fewer than
    /// `bytes.len()` if the underlying buffer is near-full; callers chunk and retry.
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize>;

    /// Discard anything still queued in the output buffer.
    fn reset_output(&mut self) -> std::io::Result<()>;

    fn close(&mut self) -> std::io::Result<()>;
}

/// Enumerate serial ports visible to the OS. A thin wrapper so the Manager's discovery
/// logic (§4.5) can be exercised against a fake list in tests.
pub trait PortEnumerator: Send + Sync {
    fn enumerate_ports(&self) -> std::io::Result<Vec<PortInfo>>;
}
