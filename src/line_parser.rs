//! Streaming byte→line splitter and line classifier (SPEC_FULL.md §4.2).
//!
//! Grounded on `examples/original_source/telecortex/session.py`'s `re_*` class
//! attributes (`re_line_ok`, `re_line_error`, `re_line_response`, `re_resend`,
//! `re_loo_rates`, …) and `parse_response`/`get_line`, reworked as `nom` parser
//! combinators per the teacher's own dependency on `nom` (`core/Cargo.toml`) rather than
//! introducing a `regex` dependency the teacher does not carry.

use std::collections::VecDeque;

use nom::{branch::alt,
          bytes::complete::{is_not, tag, take_while1},
          character::complete::{char, digit1, space0},
          combinator::{opt, rest},
          sequence::{preceded, terminated},
          IResult};

/// Telemetry reported periodically by a controller in a `;LOO:` line.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub fps: f64,
    pub cmd_rate: f64,
    pub pix_rate: f64,
    pub queue_occupied: u64,
    pub queue_max: u64,
}

/// The classification of one completed line received from a controller.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    /// Controller's command queue is empty.
    Idle,
    /// `;LOO: …` periodic telemetry.
    Telemetry(Telemetry),
    /// `;SET: …` or any other `;`-prefixed informational line.
    Informational(String),
    /// `N<d>: OK` — acknowledgement through line `d`.
    Ack { line: u64 },
    /// `N<d>: E<e>: <msg>` — per-line error.
    LineError { line: u64, code: u32, message: String },
    /// `N<d>: <token>` — response payload for a query at line `d`.
    Response { line: u64, payload: String },
    /// `E<e>: <msg>` — unlined error.
    UnlinedError { code: u32, message: String },
    /// `RS <d>` — resend request starting at line `d`.
    Resend { line: u64 },
    /// Anything that matched none of the above.
    Unrecognized(String),
}

fn parse_u64(input: &str) -> IResult<&str, u64> {
    let (rest, digits) = digit1(input)?;
    Ok((rest, digits.parse().expect("digit1 only yields ASCII digits")))
}

fn parse_f64(input: &str) -> IResult<&str, f64> {
    let (rest, digits) = take_while1(|c: char| c.is_ascii_digit() || c == '.')(input)?;
    digits
        .parse()
        .map(|value| (rest, value))
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Float)))
}

fn parse_idle(input: &str) -> IResult<&str, LineEvent> {
    let (rest, _) = tag("IDLE")(input)?;
    Ok((rest, LineEvent::Idle))
}

fn parse_telemetry(input: &str) -> IResult<&str, LineEvent> {
    let sep = |i| -> IResult<&str, ()> {
        let (i, _) = space0(i)?;
        let (i, _) = opt(char(','))(i)?;
        let (i, _) = space0(i)?;
        Ok((i, ()))
    };
    let (input, _) = tag(";LOO:")(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = tag("FPS:")(input)?;
    let (input, _) = space0(input)?;
    let (input, fps) = parse_f64(input)?;
    let (input, _) = sep(input)?;
    let (input, _) = tag("CMD_RATE:")(input)?;
    let (input, _) = space0(input)?;
    let (input, cmd_rate) = parse_f64(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = opt(tag("cps"))(input)?;
    let (input, _) = sep(input)?;
    let (input, _) = tag("PIX_RATE:")(input)?;
    let (input, _) = space0(input)?;
    let (input, pix_rate) = parse_f64(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = opt(tag("pps"))(input)?;
    let (input, _) = sep(input)?;
    let (input, _) = tag("QUEUE:")(input)?;
    let (input, _) = space0(input)?;
    let (input, queue_occupied) = parse_u64(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = char('/')(input)?;
    let (input, _) = space0(input)?;
    let (input, queue_max) = parse_u64(input)?;
    Ok((
        input,
        LineEvent::Telemetry(Telemetry {
            fps,
            cmd_rate,
            pix_rate,
            queue_occupied,
            queue_max,
        }),
    ))
}

fn parse_informational(input: &str) -> IResult<&str, LineEvent> {
    let (rest, _) = char(';')(input)?;
    Ok(("", LineEvent::Informational(format!(";{rest}"))))
}

fn numbered_prefix(input: &str) -> IResult<&str, u64> {
    preceded(char('N'), terminated(parse_u64, preceded(char(':'), space0)))(input)
}

fn parse_ack(input: &str) -> IResult<&str, LineEvent> {
    let (input, line) = numbered_prefix(input)?;
    let (input, _) = tag("OK")(input)?;
    Ok((input, LineEvent::Ack { line }))
}

fn error_code_and_message(input: &str) -> IResult<&str, (u32, String)> {
    let (input, _) = char('E')(input)?;
    let (input, code) = parse_u64(input)?;
    let (input, _) = char(':')(input)?;
    let (input, _) = space0(input)?;
    let (input, message) = rest(input)?;
    Ok((input, (code as u32, message.to_string())))
}

fn parse_line_error(input: &str) -> IResult<&str, LineEvent> {
    let (input, line) = numbered_prefix(input)?;
    let (input, (code, message)) = error_code_and_message(input)?;
    Ok((input, LineEvent::LineError { line, code, message }))
}

fn parse_line_response(input: &str) -> IResult<&str, LineEvent> {
    let (input, line) = numbered_prefix(input)?;
    let (input, payload) = is_not("")(input)?;
    if payload.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::NonEmpty,
        )));
    }
    Ok(("", LineEvent::Response { line, payload: payload.to_string() }))
}

fn parse_unlined_error(input: &str) -> IResult<&str, LineEvent> {
    let (input, (code, message)) = error_code_and_message(input)?;
    Ok((input, LineEvent::UnlinedError { code, message }))
}

fn parse_resend(input: &str) -> IResult<&str, LineEvent> {
    let (input, _) = tag("RS")(input)?;
    let (input, _) = space0(input)?;
    let (input, line) = parse_u64(input)?;
    Ok((input, LineEvent::Resend { line }))
}

/// Classify one already-split, trimmed line. Order-sensitive: IDLE, then telemetry/
/// informational, then `N…` (ack/error/response), then unlined error, then resend.
pub fn classify_line(line: &str) -> LineEvent {
    if let Ok((_, event)) = parse_idle(line) {
        return event;
    }
    if line.starts_with(';') {
        if let Ok((_, event)) = parse_telemetry(line) {
            return event;
        }
        if let Ok((_, event)) = parse_informational(line) {
            return event;
        }
    }
    if line.starts_with('N') {
        if let Ok((remaining, event)) = parse_ack(line) {
            if remaining.is_empty() {
                return event;
            }
        }
        if let Ok((_, event)) = parse_line_error(line) {
            return event;
        }
        if let Ok((_, event)) = parse_line_response(line) {
            return event;
        }
    }
    if line.starts_with('E') {
        if let Ok((_, event)) = parse_unlined_error(line) {
            return event;
        }
    }
    if line.starts_with("RS") {
        if let Ok((_, event)) = parse_resend(line) {
            return event;
        }
    }
    LineEvent::Unrecognized(line.to_string())
}

/// Incremental byte→line splitter. Bytes arrive in arbitrary chunks; `\r+|\n+` runs
/// delimit completed lines, which are pushed onto an internal FIFO for the session to
/// drain with [`LineParser::next_line`].
#[derive(Debug, Default)]
pub struct LineParser {
    line_buffer: String,
    line_queue: VecDeque<String>,
}

impl LineParser {
    pub fn new() -> Self { Self::default() }

    /// Feed newly-read bytes. Lossy-decodes non-UTF8 bytes rather than failing the
    /// session over a single garbled byte on the wire.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.line_buffer.push_str(&String::from_utf8_lossy(bytes));
        self.split_buffered_lines();
    }

    fn split_buffered_lines(&mut self) {
        loop {
            let Some(terminator_start) = self.line_buffer.find(['\r', '\n']) else {
                break;
            };
            let line = self.line_buffer[..terminator_start].to_string();
            let after_line = &self.line_buffer[terminator_start..];
            let terminator_len = after_line
                .chars()
                .take_while(|c| *c == '\r' || *c == '\n')
                .count();
            self.line_buffer = self.line_buffer[terminator_start + terminator_len..].to_string();
            if !line.is_empty() {
                self.line_queue.push_back(line);
            }
        }
    }

    pub fn next_line(&mut self) -> Option<String> { self.line_queue.pop_front() }

    pub fn has_queued_lines(&self) -> bool { !self.line_queue.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_on_crlf_and_bare_lf() {
        let mut parser = LineParser::new();
        parser.feed(b"N1: OK\r\nN2: OK\nIDLE\r\r\n");
        assert_eq!(parser.next_line().as_deref(), Some("N1: OK"));
        assert_eq!(parser.next_line().as_deref(), Some("N2: OK"));
        assert_eq!(parser.next_line().as_deref(), Some("IDLE"));
        assert_eq!(parser.next_line(), None);
    }

    #[test]
    fn holds_incomplete_fragment() {
        let mut parser = LineParser::new();
        parser.feed(b"N1: O");
        assert_eq!(parser.next_line(), None);
        parser.feed(b"K\n");
        assert_eq!(parser.next_line().as_deref(), Some("N1: OK"));
    }

    #[test]
    fn classifies_idle_before_telemetry_before_numbered_before_error_before_resend() {
        assert_eq!(classify_line("IDLE"), LineEvent::Idle);
        assert_eq!(classify_line("N3: OK"), LineEvent::Ack { line: 3 });
        assert_eq!(
            classify_line("N3: E10: checksum mismatch"),
            LineEvent::LineError { line: 3, code: 10, message: "checksum mismatch".into() }
        );
        assert_eq!(
            classify_line("N3: S42"),
            LineEvent::Response { line: 3, payload: "S42".into() }
        );
        assert_eq!(
            classify_line("E5: board not ready"),
            LineEvent::UnlinedError { code: 5, message: "board not ready".into() }
        );
        assert_eq!(classify_line("RS 7"), LineEvent::Resend { line: 7 });
    }

    #[test]
    fn classifies_telemetry_line() {
        let event = classify_line(
            ";LOO: FPS: 29.9, CMD_RATE: 120 cps, PIX_RATE: 31616 pps, QUEUE: 2/5",
        );
        assert_eq!(
            event,
            LineEvent::Telemetry(Telemetry {
                fps: 29.9,
                cmd_rate: 120.0,
                pix_rate: 31616.0,
                queue_occupied: 2,
                queue_max: 5,
            })
        );
    }

    #[test]
    fn classifies_informational_set_line() {
        match classify_line(";SET: Q0") {
            LineEvent::Informational(line) => assert_eq!(line, ";SET: Q0"),
            other => panic!("expected Informational, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_line_falls_through() {
        match classify_line("garbage") {
            LineEvent::Unrecognized(line) => assert_eq!(line, "garbage"),
            other => panic!("expected Unrecognized, got {other:?}"),
        }
    }
}
