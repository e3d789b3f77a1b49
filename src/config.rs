//! Closed set of recognized configuration options (SPEC_FULL.md §6).
//!
//! Grounded on `examples/original_source/telecortex/session.py`'s `chunk_size`,
//! `ser_buff_size`, `max_ack_queue`, `do_crc`, `ignore_acks` class attributes/kwargs, and
//! on the teacher's own `serde::Deserialize` usage (`core/Cargo.toml` lists `serde`).
//! This crate deliberately stops at plain deserializable structs: reading a particular
//! file format (TOML/JSON/env) is left to the embedding CLI, which is out of scope
//! (SPEC_FULL.md §1).

use std::time::Duration;

use serde::Deserialize;

fn default_chunk_size() -> usize { 261 }
fn default_max_ack_window() -> usize { 5 }
fn default_queue_capacity() -> usize { 10 }
fn default_max_submit_retries() -> u32 { 1000 }
fn default_baud() -> u32 { 57_600 }

/// Per-session protocol tuning (§3 "Limits", §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound on outstanding line-numbered commands; the readiness predicate uses
    /// it.
    pub max_ack_window: usize,
    /// Maximum wire-line byte length; the chunker fits payload segments accordingly.
    pub chunk_size: usize,
    /// Maximum bytes permitted in the transport's write buffer before `ready()` is
    /// false. Defaults to `1.2 * chunk_size`, matching the original's
    /// `ser_buff_size = int(1.2 * chunk_size)`.
    pub out_buf_budget: usize,
    /// Append an XOR checksum to every emitted line.
    pub do_checksum: bool,
    /// When true, don't track the ack queue; readiness depends solely on
    /// `out_buf_budget`.
    pub ignore_acks: bool,
    /// When true, demote an unknown fatal error code (outside 10/11/14/19) to a logged
    /// warning instead of terminating the session.
    pub lenient_error_codes: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let chunk_size = default_chunk_size();
        Self {
            max_ack_window: default_max_ack_window(),
            chunk_size,
            out_buf_budget: (chunk_size as f64 * 1.2) as usize,
            do_checksum: true,
            ignore_acks: false,
            lenient_error_codes: false,
        }
    }
}

/// Descriptor used by the Manager to locate a controller's serial port (§4.5).
///
/// Every field is an `Option`; an absent field is a wildcard during enumeration-based
/// discovery, except `device_path`, which when present bypasses enumeration entirely.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControllerDescriptor {
    pub device_path: Option<String>,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub serial_number: Option<String>,
    /// Expected controller ID; when set and more than one port remains after VID/PID
    /// filtering, each candidate is handshaken to find the one reporting this CID.
    pub cid: Option<String>,
}

/// Transport-level and queueing parameters for one registered controller (§6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub baud: u32,
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    pub queue_capacity: usize,
    pub session: SessionConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            baud: default_baud(),
            timeout: Duration::from_secs(1),
            queue_capacity: default_queue_capacity(),
            session: SessionConfig::default(),
        }
    }
}

/// Manager-wide policy (§6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Include `serial_number` when filtering discovered ports. Off by default because
    /// some platforms report serial numbers inconsistently (§9 open question (c)).
    pub match_serial_number: bool,
    /// Bound on `submit`'s queue-full / respawn retry loop.
    pub max_submit_retries: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            match_serial_number: false,
            max_submit_retries: default_max_submit_retries(),
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
