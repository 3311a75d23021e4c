//! # SSP — State Synchronization Protocol
//!
//! A Mosh-inspired protocol for continuously replicating a single
//! authoritative string from a sender to a receiver over an unreliable,
//! unordered datagram channel, extended with a **randomized reference-state
//! policy**: each outgoing diff is computed against either the
//! most-recently-sent state ("assumed") or the highest-acknowledged state
//! ("known"), with the choice weighted by a configurable probability λ.
//! This trades some redundant bandwidth for resilience to sustained packet
//! loss, without requiring retransmission or ordered delivery.
//!
//! ## Feature flags
//!
//! - `transport` (default): the UDP-backed [`Transporter`](transport::Transporter)
//!   and the [`Sender`](sync::Sender)/[`Receiver`](sync::Receiver) state
//!   machines that use it. Without it, only the wire-format and algorithmic
//!   core in [`core`] is compiled — useful for fuzzing the diff engine or
//!   instruction codec without pulling in `tokio`.
//!
//! ## Modules
//!
//! - [`core`]: datagram framing, the Transport Instruction codec, the diff
//!   engine, the inflight dependency tracker, and configuration (always
//!   included).
//! - [`transport`]: the UDP socket wrapper and RTT/RTO estimation (requires
//!   `transport`).
//! - [`sync`]: the sender and receiver state machines (requires
//!   `transport`).
//!
//! ## Example
//!
//! ```no_run
//! use ssp_protocol::core::Config;
//! use ssp_protocol::sync::{Receiver, Sender};
//! use ssp_protocol::transport::Transporter;
//!
//! # async fn run() -> Result<(), ssp_protocol::core::SspError> {
//! let mut sender = Sender::new(0.3, None);
//! let mut sender_transport = Transporter::bind(&Config::sender(60001, "127.0.0.1", 60002)).await?;
//!
//! let mut receiver = Receiver::new();
//! let mut receiver_transport = Transporter::bind(&Config::receiver(60002)).await?;
//!
//! sender.send_message(&mut sender_transport, "hello").await?;
//! let instruction = receiver_transport.recv().await?;
//! receiver.on_receive(&mut receiver_transport, &instruction).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;

#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod sync;

#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

/// Convenience re-exports of the types most callers need.
pub mod prelude {
    pub use crate::core::{
        apply, generate_patch, Config, DatagramError, DiffError, InflightTracker,
        Instruction, InstructionError, Opcode, Packet, Role, SspError, State,
    };

    #[cfg(feature = "transport")]
    pub use crate::sync::{ReceiveOutcome, Receiver, ReceiverPhase, Sender};

    #[cfg(feature = "transport")]
    pub use crate::transport::{RttEstimator, Transporter};
}
