//! Error types for the SSP protocol.

use thiserror::Error;

/// Errors decoding or constructing a datagram header.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatagramError {
    /// Input is shorter than the fixed 14-byte header.
    #[error("malformed header: expected at least {expected} bytes, got {actual}")]
    MalformedHeader {
        /// Minimum bytes required.
        expected: usize,
        /// Actual bytes received.
        actual: usize,
    },

    /// Sequence number does not fit in the 63 bits left by the direction bit.
    #[error("invalid sequence number: {0} does not fit in 63 bits")]
    InvalidSeq(u64),

    /// Signal strength outside the `-127..=0` dBm range.
    #[error("invalid signal strength: {0} dBm (must be -127..=0)")]
    InvalidSignalStrength(i8),
}

/// Errors decoding a Transport Instruction.
#[derive(Debug, Error)]
pub enum InstructionError {
    /// The JSON record could not be parsed or didn't match the expected shape.
    #[error("malformed instruction: {0}")]
    MalformedInstruction(#[from] serde_json::Error),
}

/// Errors applying or generating a diff.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiffError {
    /// An opcode's indices are inconsistent with the state it is applied to.
    #[error("malformed diff: {0}")]
    MalformedDiff(String),
}

/// Top-level SSP error, returned by every fallible core operation.
#[derive(Debug, Error)]
pub enum SspError {
    /// Datagram framing error.
    #[error("datagram error: {0}")]
    Datagram(#[from] DatagramError),

    /// Instruction codec error.
    #[error("instruction error: {0}")]
    Instruction(#[from] InstructionError),

    /// Diff engine error.
    #[error("diff error: {0}")]
    Diff(#[from] DiffError),

    /// Outgoing packet has no known peer address yet.
    #[error("peer address unknown")]
    PeerUnknown,

    /// A timed `recv` expired before a packet arrived.
    #[error("socket recv timed out")]
    SocketTimeout,

    /// Unrecoverable socket I/O error (bind failure, ENOBUFS, etc).
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is invalid or incomplete for the requested operation.
    #[error("configuration error: {0}")]
    Config(String),
}
