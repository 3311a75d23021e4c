//! Core protocol types: always compiled, independent of the `transport`
//! feature. This is the datagram/instruction/diff/tracker/config layer the
//! sender and receiver state machines (in [`crate::sync`]) build on.

mod config;
mod datagram;
mod diff;
mod error;
mod instruction;
mod tracker;

pub use config::{Config, Role};
pub use datagram::{Packet, HEADER_SIZE};
pub use diff::{apply, generate_patch, Opcode, State};
pub use error::{DatagramError, DiffError, InstructionError, SspError};
pub use instruction::Instruction;
pub use tracker::InflightTracker;
