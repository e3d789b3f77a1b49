//! Concrete `Transport` backed by the `serialport` crate.
//!
//! Grounded on `examples/original_source/telecortex/session.py`'s
//! `TelecortexSession.from_serial_conf` (opens `serial.Serial(port=…, baudrate=…,
//! timeout=…)`) and `find_serial_dev`/`query_serial_dev` (enumerate + filter by VID/PID/
//! serial number). The `serialport` crate itself is not a teacher dependency; it is
//! grounded on `examples/other_examples/manifests/timothyb89-sds011/Cargo.toml` and
//! `examples/other_examples/manifests/ryancinsight-Apollo2/Cargo.toml`, both of which
//! depend on it for driving a device over a serial link.

use std::time::Duration;

use super::{PortEnumerator, PortInfo, Transport};

pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    pub fn open(path: &str, baud: u32, timeout: Duration) -> std::io::Result<Self> {
        let port = serialport::new(path, baud)
            .timeout(timeout)
            .open()
            .map_err(to_io_error)?;
        Ok(Self { port })
    }
}

fn to_io_error(err: serialport::Error) -> std::io::Error {
    std::io::Error::other(err)
}

impl Transport for SerialTransport {
    fn in_waiting(&mut self) -> std::io::Result<usize> {
        self.port.bytes_to_read().map(|n| n as usize).map_err(to_io_error)
    }

    fn out_waiting(&mut self) -> std::io::Result<usize> {
        self.port.bytes_to_write().map(|n| n as usize).map_err(to_io_error)
    }

    fn read_available(&mut self) -> std::io::Result<Vec<u8>> {
        use std::io::Read;
        let available = self.in_waiting()?;
        if available == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; available];
        let read = self.port.read(&mut buf)?;
        buf.truncate(read);
        Ok(buf)
    }

    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        use std::io::Write;
        self.port.write(bytes)
    }

    fn reset_output(&mut self) -> std::io::Result<()> {
        self.port.clear(serialport::ClearBuffer::Output).map_err(to_io_error)
    }

    fn close(&mut self) -> std::io::Result<()> { Ok(()) }
}

/// Enumerates OS-visible serial ports via `serialport::available_ports`.
pub struct SystemPortEnumerator;

impl PortEnumerator for SystemPortEnumerator {
    fn enumerate_ports(&self) -> std::io::Result<Vec<PortInfo>> {
        let ports = serialport::available_ports().map_err(to_io_error)?;
        Ok(ports
            .into_iter()
            .map(|port| {
                let (vendor_id, product_id, serial_number) = match port.port_type {
                    serialport::SerialPortType::UsbPort(usb) => {
                        (Some(usb.vid), Some(usb.pid), usb.serial_number)
                    }
                    _ => (None, None, None),
                };
                PortInfo { path: port.port_name, vendor_id, product_id, serial_number }
            })
            .collect())
    }
}
