//! Fixed-size datagram header framing.
//!
//! Wire layout (big-endian, 14 bytes total):
//!
//! ```text
//! +0   nonce       (8 bytes, u64: bit 63 = direction, bits 0..=62 = seq)
//! +8   ts          (2 bytes, u16, truncated send timestamp)
//! +10  ts_reply    (2 bytes, u16, echoed peer timestamp)
//! +12  signal_dbm  (2 bytes, i16, clamped to -127..=0)
//! +14  payload     (variable)
//! ```
//!
//! The signal field is wire-encoded as a 2-byte signed value (not 1 byte) to
//! match the original reference implementation's `'!QHHh'` struct format,
//! which is what makes the header exactly 14 bytes. See DESIGN.md.

use crate::core::error::DatagramError;

/// Bytes occupied by the fixed header, before the payload.
pub const HEADER_SIZE: usize = 14;

/// Highest sequence number representable in the 63 bits left by the
/// direction bit.
const MAX_SEQ: u64 = (1u64 << 63) - 1;

/// One framed datagram: a header plus an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// True for one endpoint role, false for the other; lets a receiver
    /// that sees both directions of traffic (e.g. in a test) tell them
    /// apart.
    pub direction: bool,
    /// Monotonically increasing per-endpoint sequence number.
    pub seq: u64,
    /// This endpoint's send timestamp, truncated to 16 bits.
    pub ts: u16,
    /// The peer's most recently received `ts`, echoed back (or zero).
    pub ts_reply: u16,
    /// Signal strength in dBm, `-127..=0`.
    pub signal_dbm: i8,
    /// Instruction payload (JSON bytes).
    pub payload: Vec<u8>,
}

impl Packet {
    /// Construct a packet, validating the fields that have a defined range.
    pub fn new(
        direction: bool,
        seq: u64,
        ts: u16,
        ts_reply: u16,
        signal_dbm: i8,
        payload: Vec<u8>,
    ) -> Result<Self, DatagramError> {
        if seq > MAX_SEQ {
            return Err(DatagramError::InvalidSeq(seq));
        }
        if !(-127..=0).contains(&signal_dbm) {
            return Err(DatagramError::InvalidSignalStrength(signal_dbm));
        }
        Ok(Self {
            direction,
            seq,
            ts,
            ts_reply,
            signal_dbm,
            payload,
        })
    }

    /// Pack into wire bytes. Infallible: validity was checked at construction.
    pub fn pack(&self) -> Vec<u8> {
        debug_assert!(self.seq <= MAX_SEQ);
        let nonce = ((self.direction as u64) << 63) | self.seq;
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&nonce.to_be_bytes());
        buf.extend_from_slice(&self.ts.to_be_bytes());
        buf.extend_from_slice(&self.ts_reply.to_be_bytes());
        buf.extend_from_slice(&(self.signal_dbm as i16).to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Unpack from wire bytes.
    pub fn unpack(data: &[u8]) -> Result<Self, DatagramError> {
        if data.len() < HEADER_SIZE {
            return Err(DatagramError::MalformedHeader {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }
        let nonce = u64::from_be_bytes(data[0..8].try_into().unwrap());
        let direction = (nonce >> 63) & 1 == 1;
        let seq = nonce & MAX_SEQ;
        let ts = u16::from_be_bytes(data[8..10].try_into().unwrap());
        let ts_reply = u16::from_be_bytes(data[10..12].try_into().unwrap());
        let signal_raw = i16::from_be_bytes(data[12..14].try_into().unwrap());
        if !(-127..=0).contains(&signal_raw) {
            return Err(DatagramError::InvalidSignalStrength(signal_raw as i8));
        }
        let signal_dbm = signal_raw as i8;
        let payload = data[HEADER_SIZE..].to_vec();
        Ok(Self {
            direction,
            seq,
            ts,
            ts_reply,
            signal_dbm,
            payload,
        })
    }
}
