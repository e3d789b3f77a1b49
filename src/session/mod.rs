//! Per-controller protocol state machine (SPEC_FULL.md §3, §4.3).
//!
//! Grounded on `examples/original_source/telecortex/session.py`'s `TelecortexSession`:
//! `reset_board`, `set_linenum`, `get_cid`, `send_cmd_with_linenum`/
//! `send_cmd_without_linenum`, `chunk_payload_with_linenum`, `parse_responses`,
//! `handle_error`, `handle_resend`, `bytes_left`/`ready`. Reworked per design note §9 as
//! a plain struct with no back-pointer from `Command`, and with `tokio` cooperative
//! yielding (`tokio::task::yield_now`) standing in for the original's busy-wait loops.

pub mod ack_queue;

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::command::Command;
use crate::config::SessionConfig;
use crate::error::{LedFleetError, LedFleetResult, ProtocolWarning};
use crate::line_parser::{classify_line, LineEvent, LineParser, Telemetry};
use crate::transport::Transport;
use ack_queue::AckQueue;

/// Bytes reserved in every chunked segment's skeleton for `*<checksum>` plus the
/// terminator, regardless of `do_checksum`. Matches the original's literal
/// `' ****\r\n'` padding (`chunk_payload_with_linenum`).
const CHECKSUM_AND_TERMINATOR_RESERVE: usize = 7;

/// One controller's protocol engine: line numbering, outstanding-ack tracking, response
/// collection, and the line-level I/O pump. Owns its `Transport` exclusively; nothing
/// outside the owning Worker task may touch it.
pub struct Session<T: Transport> {
    transport: T,
    config: SessionConfig,
    label: String,
    controller_id: Option<String>,
    line_counter: u64,
    ack_queue: AckQueue,
    response_table: std::collections::HashMap<u64, String>,
    parser: LineParser,
    last_telemetry: Option<Telemetry>,
}

impl<T: Transport> Session<T> {
    /// `label` identifies this session in logs before a CID has been learned (e.g. the
    /// registered controller id or the resolved device path).
    pub fn new(transport: T, config: SessionConfig, label: impl Into<String>) -> Self {
        Self {
            transport,
            config,
            label: label.into(),
            controller_id: None,
            line_counter: 0,
            ack_queue: AckQueue::new(),
            response_table: std::collections::HashMap::new(),
            parser: LineParser::new(),
            last_telemetry: None,
        }
    }

    pub fn controller_id(&self) -> Option<&str> { self.controller_id.as_deref() }

    pub fn line_counter(&self) -> u64 { self.line_counter }

    pub fn ack_queue_len(&self) -> usize { self.ack_queue.len() }

    pub fn last_telemetry(&self) -> Option<&Telemetry> { self.last_telemetry.as_ref() }

    fn identity(&self) -> &str { self.controller_id.as_deref().unwrap_or(&self.label) }

    fn transport_err(&self, source: std::io::Error) -> LedFleetError {
        LedFleetError::Transport { controller_id: self.identity().to_string(), source }
    }

    fn protocol_err(&self, message: impl Into<String>) -> LedFleetError {
        LedFleetError::Protocol { controller_id: self.identity().to_string(), message: message.into() }
    }

    /// Flush the output buffer, send unnumbered `M9999`, drain any pending input, then
    /// `set_linenum(0, timeout)`.
    pub async fn reset_board(&mut self, timeout: Duration) -> LedFleetResult<()> {
        self.transport.reset_output().map_err(|e| self.transport_err(e))?;
        self.send_unnumbered("M9999", &[]).await?;
        let leftover = self.transport.read_available().map_err(|e| self.transport_err(e))?;
        if !leftover.is_empty() {
            self.parser.feed(&leftover);
            while self.parser.next_line().is_some() {}
        }
        self.set_linenum(0, timeout).await
    }

    /// Emit a numbered `M110` whose `N` argument carries the target line number, then
    /// force `line_counter = linenum + 1` (overriding whatever the emission's own
    /// numbering advanced it to) and pump until `ack_queue` is empty or `timeout`
    /// elapses — the controller's ack for this `M110` still references the line number
    /// it was sent under, from before the override.
    pub async fn set_linenum(&mut self, linenum: u64, timeout: Duration) -> LedFleetResult<()> {
        self.send_numbered("M110", &[('N', linenum.to_string())]).await?;
        self.line_counter = linenum + 1;

        let deadline = tokio::time::Instant::now() + timeout;
        while !self.ack_queue.is_empty() {
            if tokio::time::Instant::now() >= deadline {
                return Err(self.protocol_err(format!(
                    "set_linenum({linenum}) timed out after {timeout:?} with {} entries still outstanding",
                    self.ack_queue.len()
                )));
            }
            self.pump().await?;
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    /// Query the controller's identifier via `P2205`; stores and returns it.
    pub async fn get_cid(&mut self, timeout: Duration) -> LedFleetResult<String> {
        let line = self.send_numbered("P2205", &[]).await?;

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(response) = self.response_table.get(&line) {
                let cid = response
                    .strip_prefix('S')
                    .ok_or_else(|| {
                        self.protocol_err(format!("malformed CID response for N{line}: {response}"))
                    })?
                    .to_string();
                self.controller_id = Some(cid.clone());
                return Ok(cid);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(self.protocol_err(format!("get_cid timed out after {timeout:?}")));
            }
            self.pump().await?;
            tokio::task::yield_now().await;
        }
    }

    /// Emit a line-numbered command: wait for readiness, write it, record it in
    /// `ack_queue` (unless `ignore_acks`), advance `line_counter`. Returns the assigned
    /// line number.
    pub async fn send_numbered(&mut self, opcode: &str, args: &[(char, String)]) -> LedFleetResult<u64> {
        let opcode_owned = opcode.to_string();
        let args_owned = args.to_vec();
        let do_checksum = self.config.do_checksum;
        self.wait_ready_for_emit(|session| {
            preview_command(&opcode_owned, &args_owned, Some(session.line_counter))
                .format_wire_line(true, do_checksum)
                .len()
        })
        .await?;
        self.emit_numbered_direct(opcode, args).await
    }

    /// Emit a fire-and-forget command; not tracked in `ack_queue`.
    pub async fn send_unnumbered(&mut self, opcode: &str, args: &[(char, String)]) -> LedFleetResult<()> {
        let command = preview_command(opcode, args, None);
        let formatted = command.format_wire_line(false, self.config.do_checksum);
        let len = formatted.len();
        self.wait_ready_for_emit(|_| len).await?;
        self.write_all(&formatted).await?;
        Ok(())
    }

    /// Split `payload` (base64 ASCII, 4 chars per pixel) across as many numbered
    /// commands as needed to respect `chunk_size`. `None` degenerates to
    /// `send_numbered(opcode, static_args)`.
    pub async fn chunk_numbered(
        &mut self,
        opcode: &str,
        static_args: &[(char, String)],
        payload: Option<&str>,
    ) -> LedFleetResult<()> {
        let Some(payload) = payload else {
            self.send_numbered(opcode, static_args).await?;
            return Ok(());
        };

        let mut offset_pixels: u64 = 0;
        let mut remaining = payload;
        while !remaining.is_empty() {
            let mut args = static_args.to_vec();
            if offset_pixels > 0 {
                args.push(('S', offset_pixels.to_string()));
            }
            let pixels_left = self.pixels_left_for_segment(opcode, &args)?;
            let take = (pixels_left * 4).min(remaining.len());
            let segment = &remaining[..take];
            args.push(('V', segment.to_string()));

            self.send_numbered(opcode, &args).await?;

            offset_pixels += (take / 4) as u64;
            remaining = &remaining[take..];
        }
        Ok(())
    }

    /// How many whole pixels (4 base64 chars) fit in one segment given the skeleton
    /// (opcode + `args` with an empty trailing `V`) and the configured `chunk_size`.
    fn pixels_left_for_segment(&self, opcode: &str, args: &[(char, String)]) -> LedFleetResult<usize> {
        let mut skeleton_args = args.to_vec();
        skeleton_args.push(('V', String::new()));
        let skeleton = preview_command(opcode, &skeleton_args, Some(self.line_counter))
            .format(true, false);
        let available = self
            .config
            .chunk_size
            .saturating_sub(skeleton.len())
            .saturating_sub(CHECKSUM_AND_TERMINATOR_RESERVE);
        let pixels_left = available / 4;
        if pixels_left == 0 {
            return Err(self.protocol_err(format!(
                "chunk_size {} too small to fit any pixels after skeleton {:?}",
                self.config.chunk_size, skeleton
            )));
        }
        Ok(pixels_left)
    }

    /// Emit a numbered command without waiting on readiness first. Used by
    /// `send_numbered` (after its own wait loop) and by resend handling inside `pump`,
    /// which must not recurse back through `send_numbered`'s wait loop (that loop itself
    /// calls `pump`).
    async fn emit_numbered_direct(&mut self, opcode: &str, args: &[(char, String)]) -> LedFleetResult<u64> {
        let linenum = self.line_counter;
        let mut command = Command::new(opcode).with_line_number(linenum);
        for (key, value) in args {
            command = command.with_arg(*key, value);
        }
        let formatted = command.format_wire_line(true, self.config.do_checksum);
        let wire_len = self.write_all(&formatted).await?;
        command.wire_len = Some(wire_len);
        if !self.config.ignore_acks {
            self.ack_queue.insert(linenum, command);
        }
        self.line_counter += 1;
        Ok(linenum)
    }

    /// Block while input is pending or the output budget can't fit `compute_len`
    /// bytes, pumping in between. `compute_len` is re-evaluated each iteration since
    /// `pump` (via resend handling) may advance `line_counter` underneath a waiting
    /// caller.
    async fn wait_ready_for_emit<F>(&mut self, mut compute_len: F) -> LedFleetResult<()>
    where
        F: FnMut(&Self) -> usize,
    {
        loop {
            let in_waiting = self.transport.in_waiting().map_err(|e| self.transport_err(e))?;
            let out_waiting = self.transport.out_waiting().map_err(|e| self.transport_err(e))?;
            let budget_left = self.config.out_buf_budget.saturating_sub(out_waiting);
            let formatted_len = compute_len(self);
            if in_waiting == 0 && formatted_len <= budget_left {
                return Ok(());
            }
            self.pump().await?;
            tokio::task::yield_now().await;
        }
    }

    /// Write `text` to the transport in full, cooperatively yielding between partial
    /// writes when the transport's buffer is momentarily full.
    async fn write_all(&mut self, text: &str) -> LedFleetResult<usize> {
        let bytes = text.as_bytes();
        let mut written = 0usize;
        while written < bytes.len() {
            let n = self.transport.write(&bytes[written..]).map_err(|e| self.transport_err(e))?;
            if n == 0 {
                tokio::task::yield_now().await;
                continue;
            }
            written += n;
            if written < bytes.len() {
                tokio::task::yield_now().await;
            }
        }
        Ok(written)
    }

    /// True iff the session is ready to accept another `send_numbered`/`chunk_numbered`
    /// call without blocking: the ack window has room, and (unless `ignore_acks`) the
    /// transport's output buffer has room.
    pub fn ready(&mut self) -> LedFleetResult<bool> {
        if self.ack_queue.len() > self.config.max_ack_window {
            return Ok(false);
        }
        if self.config.ignore_acks {
            return Ok(true);
        }
        let out_waiting = self.transport.out_waiting().map_err(|e| self.transport_err(e))?;
        Ok(out_waiting < self.config.out_buf_budget)
    }

    /// Parse all currently available bytes and update ack window, responses, telemetry,
    /// and error/resend handling.
    pub async fn pump(&mut self) -> LedFleetResult<()> {
        let bytes = self.transport.read_available().map_err(|e| self.transport_err(e))?;
        if !bytes.is_empty() {
            self.parser.feed(&bytes);
        }

        let mut idle_count = 0u32;
        let mut saw_line_activity = false;

        while let Some(line) = self.parser.next_line() {
            debug!(controller = self.identity(), line = %line, "received line");
            match classify_line(&line) {
                LineEvent::Idle => idle_count += 1,
                LineEvent::Telemetry(telemetry) => {
                    info!(
                        controller = self.identity(),
                        fps = telemetry.fps,
                        cmd_rate = telemetry.cmd_rate,
                        pix_rate = telemetry.pix_rate,
                        queue_occupied = telemetry.queue_occupied,
                        queue_max = telemetry.queue_max,
                        "telemetry"
                    );
                    self.last_telemetry = Some(telemetry);
                }
                LineEvent::Informational(text) => {
                    info!(controller = self.identity(), %text, "informational");
                }
                LineEvent::Ack { line } => {
                    saw_line_activity = true;
                    self.ack_queue.remove_through(line);
                }
                LineEvent::LineError { line, code, message } => {
                    saw_line_activity = true;
                    self.handle_error(Some(line), code, &message)?;
                }
                LineEvent::Response { line, payload } => {
                    saw_line_activity = true;
                    self.response_table.insert(line, payload);
                }
                LineEvent::UnlinedError { code, message } => {
                    saw_line_activity = true;
                    self.handle_error(None, code, &message)?;
                }
                LineEvent::Resend { line } => {
                    saw_line_activity = true;
                    self.handle_resend(line).await?;
                }
                LineEvent::Unrecognized(text) => {
                    warn!(
                        controller = self.identity(),
                        %text,
                        warning = %ProtocolWarning::UnrecognizedLine,
                        "unrecognized line"
                    );
                }
            }
        }

        if idle_count > 0 && !saw_line_activity {
            self.ack_queue.clear();
        }
        Ok(())
    }

    fn handle_error(&self, line: Option<u64>, code: u32, message: &str) -> LedFleetResult<()> {
        let warning = match code {
            10 | 19 => Some(ProtocolWarning::ChecksumOrSequenceMismatch),
            11 => Some(ProtocolWarning::AlreadyAcknowledged),
            14 => Some(ProtocolWarning::Base64LengthMismatch),
            _ => None,
        };
        match warning {
            Some(warning) => {
                warn!(controller = self.identity(), line, code, %message, %warning, "protocol warning");
                Ok(())
            }
            None if self.config.lenient_error_codes => {
                warn!(
                    controller = self.identity(),
                    line, code, %message, "unknown error code (lenient_error_codes)"
                );
                Ok(())
            }
            None => Err(self.protocol_err(format!(
                "fatal error E{code}{}: {message}",
                line.map(|l| format!(" for N{l}")).unwrap_or_default()
            ))),
        }
    }

    /// Snapshot everything outstanding from `line`, clear the ack queue, rewind
    /// `line_counter`, and re-emit each snapshotted command with fresh line numbers.
    async fn handle_resend(&mut self, line: u64) -> LedFleetResult<()> {
        if !self.ack_queue.contains(line) {
            warn!(
                controller = self.identity(),
                line,
                warning = %ProtocolWarning::ResendUnknownLinenum,
                "resend for unknown line number"
            );
        }
        let snapshot = self.ack_queue.snapshot_from(line);
        self.ack_queue.clear();
        self.line_counter = line;
        for (_, command) in snapshot {
            let opcode = command.opcode.clone();
            let args: Vec<(char, String)> = command.args().to_vec();
            self.emit_numbered_direct(&opcode, &args).await?;
        }
        Ok(())
    }

    pub async fn close(mut self) -> LedFleetResult<()> {
        self.transport.close().map_err(|e| self.transport_err(e))
    }
}

/// Build a `Command` purely to measure its formatted length; never recorded anywhere.
fn preview_command(opcode: &str, args: &[(char, String)], line_number: Option<u64>) -> Command {
    let mut command = Command::new(opcode);
    for (key, value) in args {
        command = command.with_arg(*key, value);
    }
    if let Some(linenum) = line_number {
        command = command.with_line_number(linenum);
    }
    command
}
