//! Sender and receiver state machines (spec.md §4.F, §4.G).
//!
//! Feature-gated behind `transport` since both take a `&mut Transporter`
//! parameter rather than owning one — the event loop that owns the socket
//! is expected to own the state machine too (spec.md §9's "prefer an
//! explicit pull model" note).

mod receiver;
mod sender;

pub use receiver::{ReceiveOutcome, Receiver, ReceiverPhase};
pub use sender::Sender;
