//! Receiver state machine (spec.md §4.G): reconstructs states by applying
//! received diffs atop the referenced old state, acknowledges each
//! successfully applied state, and counts discards when the referenced old
//! state is missing.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::core::{apply, Instruction, SspError, State};
use crate::transport::Transporter;

/// Receiver-side connection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverPhase {
    /// No well-formed instruction referencing state 0 has arrived yet.
    Idle,
    /// At least one state has been successfully applied.
    Syncing,
}

/// What happened to one incoming instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The instruction's diff was applied and a new state produced.
    Applied { new_num: u64, string: String },
    /// The instruction's `old_num` isn't a state we have; discarded.
    Discarded { missing_old_num: u64 },
}

/// Reconstructs the synchronized string from a stream of instructions.
pub struct Receiver {
    states: HashMap<u64, State>,
    highest_received: u64,
    total_received: u64,
    total_discarded: u64,
    phase: ReceiverPhase,
}

impl Receiver {
    /// A receiver with no history but the implicit initial state 0.
    pub fn new() -> Self {
        let mut states = HashMap::new();
        states.insert(0, State::initial());
        Self {
            states,
            highest_received: 0,
            total_received: 0,
            total_discarded: 0,
            phase: ReceiverPhase::Idle,
        }
    }

    /// Current connection phase.
    pub fn phase(&self) -> ReceiverPhase {
        self.phase
    }

    /// Highest state number successfully applied so far.
    pub fn highest_received(&self) -> u64 {
        self.highest_received
    }

    /// Percentage of received instructions discarded for a missing
    /// reference state (`0.0` if none have been received yet).
    pub fn discard_percentage(&self) -> f64 {
        if self.total_received == 0 {
            0.0
        } else {
            (self.total_discarded as f64 / self.total_received as f64) * 100.0
        }
    }

    /// Look up a previously applied state's string by number.
    pub fn state_string(&self, num: u64) -> Option<&str> {
        self.states.get(&num).map(|s| s.string.as_str())
    }

    /// Process one incoming instruction: apply it if possible, send an
    /// acknowledgment back over `transporter`, and report what happened.
    pub async fn on_receive(
        &mut self,
        transporter: &mut Transporter,
        instruction: &Instruction,
    ) -> Result<ReceiveOutcome, SspError> {
        self.total_received += 1;

        let Some(old_state) = self.states.get(&instruction.old_num) else {
            self.total_discarded += 1;
            warn!(
                old_num = instruction.old_num,
                "reference state missing; discarding instruction"
            );
            return Ok(ReceiveOutcome::Discarded {
                missing_old_num: instruction.old_num,
            });
        };

        let new_string = apply(&instruction.diff, &old_state.string)?;
        self.states.insert(
            instruction.new_num,
            State {
                string: new_string.clone(),
                num: instruction.new_num,
                time_sent: None,
            },
        );
        self.highest_received = self.highest_received.max(instruction.new_num);
        if self.phase == ReceiverPhase::Idle && instruction.old_num == 0 {
            self.phase = ReceiverPhase::Syncing;
        }

        info!(
            state_number = instruction.new_num,
            "applied state"
        );

        transporter
            .send(
                0,
                0,
                instruction.new_num,
                instruction.new_num as i64,
                Vec::new(),
            )
            .await?;

        Ok(ReceiveOutcome::Applied {
            new_num: instruction.new_num,
            string: new_string,
        })
    }
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{generate_patch, Config};
    use crate::sync::Sender;
    use crate::transport::Transporter;

    async fn paired_transporters() -> (Transporter, Transporter) {
        let mut sender_cfg = Config::sender(0, "127.0.0.1", 0);
        sender_cfg.bind_host = "127.0.0.1".to_string();
        let mut sender = Transporter::bind(&sender_cfg).await.unwrap();
        let mut receiver_cfg = Config::receiver(0);
        receiver_cfg.bind_host = "127.0.0.1".to_string();
        let mut receiver = Transporter::bind(&receiver_cfg).await.unwrap();

        let sender_local = sender.local_addr().unwrap();
        let receiver_local = receiver.local_addr().unwrap();
        sender.set_peer_addr(receiver_local);
        receiver.set_peer_addr(sender_local);
        (sender, receiver)
    }

    #[tokio::test]
    async fn bidirectional_sync_converges_across_several_messages() {
        let (mut sender_t, mut receiver_t) = paired_transporters().await;
        let mut sender = Sender::new(0.0, Some(1));
        let mut receiver = Receiver::new();

        for text in ["hello", "hello world", "hello there world"] {
            sender.send_message(&mut sender_t, text).await.unwrap();
            let instruction = receiver_t.recv().await.unwrap();
            let outcome = receiver.on_receive(&mut receiver_t, &instruction).await.unwrap();
            match outcome {
                ReceiveOutcome::Applied { string, .. } => assert_eq!(string, text),
                ReceiveOutcome::Discarded { .. } => panic!("unexpected discard"),
            }
            let ack = sender_t.recv().await.unwrap();
            sender.on_receive(ack.ack_num);
        }

        assert_eq!(receiver.highest_received(), 3);
        assert_eq!(receiver.state_string(3), Some("hello there world"));
        assert_eq!(receiver.phase(), ReceiverPhase::Syncing);
        assert_eq!(sender.highest_ack(), 3);
    }

    #[tokio::test]
    async fn missing_reference_state_is_discarded_not_an_error() {
        let mut receiver_cfg = Config::receiver(0);
        receiver_cfg.bind_host = "127.0.0.1".to_string();
        let mut receiver_t = Transporter::bind(&receiver_cfg).await.unwrap();
        let mut sender_cfg = Config::sender(0, "127.0.0.1", 0);
        sender_cfg.bind_host = "127.0.0.1".to_string();
        let mut sender_t = Transporter::bind(&sender_cfg).await.unwrap();
        let peer = receiver_t.local_addr().unwrap();
        sender_t.set_peer_addr(peer);
        let self_addr = sender_t.local_addr().unwrap();
        receiver_t.set_peer_addr(self_addr);

        let mut receiver = Receiver::new();
        let diff = generate_patch("nonexistent base", "new");
        let instruction = Instruction {
            old_num: 99,
            new_num: 100,
            ack_num: 0,
            throwaway_num: 0,
            diff,
        };
        let outcome = receiver
            .on_receive(&mut sender_t, &instruction)
            .await
            .unwrap();
        assert_eq!(outcome, ReceiveOutcome::Discarded { missing_old_num: 99 });
        assert_eq!(receiver.phase(), ReceiverPhase::Idle);
        assert!((receiver.discard_percentage() - 100.0).abs() < 1e-9);
    }
}
