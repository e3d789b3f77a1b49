//! Drives a fleet of LED panel controllers over serial links: a line-numbered,
//! checksummed ASCII command protocol per controller (`session`), composed by a
//! worker-per-controller concurrency model (`worker`, `manager`) into a synchronized,
//! back-pressured frame pipeline.

pub mod command;
pub mod config;
pub mod error;
pub mod line_parser;
pub mod logging;
pub mod manager;
pub mod session;
pub mod transport;
pub mod worker;

pub use command::Command;
pub use config::{ControllerConfig, ControllerDescriptor, ManagerConfig, SessionConfig};
pub use error::{LedFleetError, LedFleetResult, ProtocolWarning};
pub use manager::Manager;
pub use session::Session;
pub use transport::Transport;
pub use worker::Worker;
