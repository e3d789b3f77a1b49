//! Error taxonomy (see SPEC_FULL.md §7).
//!
//! Grounded on `tui/src/core/resilient_reactor_thread/rrt_types.rs`, which pairs
//! `#[derive(thiserror::Error, miette::Diagnostic)]` on a flat enum of failure modes with
//! per-variant help text.

use thiserror::Error;

/// Convenience alias, mirrored on every fallible operation in this crate.
pub type LedFleetResult<T> = Result<T, LedFleetError>;

#[derive(Debug, Error, miette::Diagnostic)]
pub enum LedFleetError {
    /// I/O failure on transport read/write/open. Terminates the owning Session/Worker.
    #[error("transport I/O failure on controller {controller_id}: {source}")]
    #[diagnostic(
        code(ledfleet::transport),
        help("check the cable and that the controller is still enumerated by the OS")
    )]
    Transport {
        controller_id: String,
        #[source]
        source: std::io::Error,
    },

    /// Unrecoverable protocol violation: malformed handshake response, `set_linenum`
    /// timeout, or a fatal (non-leniently-configured) error code from the controller.
    #[error("protocol error on controller {controller_id}: {message}")]
    #[diagnostic(code(ledfleet::protocol))]
    Protocol {
        controller_id: String,
        message: String,
    },

    /// `Manager::submit` retried beyond `max_submit_retries`.
    #[error("submit to controller {controller_id} exhausted {retries} retries")]
    #[diagnostic(
        code(ledfleet::backpressure_exhausted),
        help("the worker may be stuck; check its transport and consider a longer retry budget")
    )]
    BackpressureRetryExhausted { controller_id: u32, retries: u32 },

    /// Device discovery found no matching serial port for a registered controller.
    #[error("no serial port matched controller {controller_id}")]
    #[diagnostic(code(ledfleet::no_matching_port))]
    NoMatchingPort { controller_id: u32 },
}

/// Recoverable conditions that are logged and do not interrupt a pump cycle (§7,
/// `ProtocolWarning`). Modeled as a plain enum rather than a `Result` error since it
/// never escapes a `Session` method; callers only ever observe its effect via logs and
/// state (ack queue, response table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ProtocolWarning {
    #[strum(serialize = "checksum_or_sequence_mismatch")]
    ChecksumOrSequenceMismatch,
    #[strum(serialize = "already_acknowledged")]
    AlreadyAcknowledged,
    #[strum(serialize = "base64_length_mismatch")]
    Base64LengthMismatch,
    #[strum(serialize = "ambiguous_device_match")]
    AmbiguousDeviceMatch,
    #[strum(serialize = "unrecognized_line")]
    UnrecognizedLine,
    #[strum(serialize = "resend_unknown_linenum")]
    ResendUnknownLinenum,
}
