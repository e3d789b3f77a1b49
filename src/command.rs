//! Value-object command formatting and checksum (SPEC_FULL.md §3, §4.1).
//!
//! Grounded on `examples/original_source/telecortex/session.py`'s
//! `TelecortexCommand`/`TelecortexLineCommand` (`fmt`, `fmt_cmd_args`, `add_checksum`),
//! reworked per design note §9 to be a plain value object with no back-pointer to the
//! owning session.

/// A single command destined for one controller.
///
/// `Command` carries no reference back to the `Session` that emitted it: the session
/// owns the ack queue and associates line numbers with commands itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub opcode: String,
    args: Vec<(char, String)>,
    pub line_number: Option<u64>,
    /// Populated once the command has actually been written to the wire.
    pub wire_len: Option<usize>,
}

impl Command {
    pub fn new(opcode: impl Into<String>) -> Self {
        Self {
            opcode: opcode.into(),
            args: Vec::new(),
            line_number: None,
            wire_len: None,
        }
    }

    pub fn with_arg(mut self, key: char, value: impl ToString) -> Self {
        self.args.push((key, value.to_string()));
        self
    }

    pub fn with_line_number(mut self, line_number: u64) -> Self {
        self.line_number = Some(line_number);
        self
    }

    pub fn args(&self) -> &[(char, String)] { &self.args }

    fn base(&self) -> String {
        let mut out = self.opcode.clone();
        for (key, value) in &self.args {
            out.push(' ');
            out.push(*key);
            out.push_str(value);
        }
        out
    }

    /// Format this command as it will appear on the wire, excluding the terminator.
    ///
    /// `include_linenum` prefixes `N<linenum> ` (requires `line_number` to be set).
    /// `include_checksum` appends ` *<xor>` where `xor` is the 8-bit XOR of every byte
    /// of the line up to and including a trailing space.
    pub fn format(&self, include_linenum: bool, include_checksum: bool) -> String {
        let mut line = String::new();
        if include_linenum {
            let linenum = self
                .line_number
                .expect("format(include_linenum=true) requires a line number");
            line.push('N');
            line.push_str(&linenum.to_string());
            line.push(' ');
        }
        line.push_str(&self.base());

        if include_checksum {
            if !line.ends_with(' ') {
                line.push(' ');
            }
            let xor = line.bytes().fold(0u8, |acc, b| acc ^ b);
            line.push('*');
            line.push_str(&xor.to_string());
        }

        line
    }

    /// Format with the `\n` terminator appended, as actually written to the transport.
    pub fn format_wire_line(&self, include_linenum: bool, include_checksum: bool) -> String {
        let mut line = self.format(include_linenum, include_checksum);
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_base_without_linenum_or_checksum() {
        let cmd = Command::new("M2600").with_arg('Q', 0);
        assert_eq!(cmd.format(false, false), "M2600 Q0");
    }

    #[test]
    fn formats_with_linenum() {
        let cmd = Command::new("M2600").with_arg('Q', 0).with_line_number(7);
        assert_eq!(cmd.format(true, false), "N7 M2600 Q0");
    }

    #[test]
    fn checksum_is_xor_of_bytes_including_trailing_space() {
        let cmd = Command::new("M9999");
        let formatted = cmd.format(false, true);
        let (base, checksum) = formatted.split_once('*').unwrap();
        assert!(base.ends_with(' '));
        let expected_xor = base.bytes().fold(0u8, |acc, b| acc ^ b);
        assert_eq!(checksum.parse::<u8>().unwrap(), expected_xor);
    }

    #[test]
    fn unnumbered_reset_has_no_linenum_prefix() {
        let cmd = Command::new("M9999");
        assert_eq!(cmd.format(false, false), "M9999");
    }
}
