//! Sender state machine (spec.md §4.F): produces new states locally,
//! selects a reference state to diff against (randomized between the
//! known-acked and most-recently-sent states, weighted by λ), and tracks
//! in-flight dependencies.

use std::collections::HashMap;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::core::{generate_patch, InflightTracker, Opcode, SspError, State};
use crate::transport::Transporter;

/// Drives local state production and reference-state selection.
pub struct Sender {
    states: HashMap<u64, State>,
    next_state_num: u64,
    inflight: InflightTracker,
    lambda: f64,
    rng: StdRng,
}

impl Sender {
    /// A sender with no history but the implicit initial state 0.
    pub fn new(lambda: f64, rng_seed: Option<u64>) -> Self {
        let mut states = HashMap::new();
        states.insert(0, State::initial());
        let rng = match rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            states,
            next_state_num: 1,
            inflight: InflightTracker::new(),
            lambda,
            rng,
        }
    }

    /// Highest state number acknowledged by the peer so far.
    pub fn highest_ack(&self) -> u64 {
        self.inflight.highest_ack()
    }

    /// Produce, diff, and send a new local state.
    ///
    /// Returns the state number assigned to `new_string`.
    pub async fn send_message(
        &mut self,
        transporter: &mut Transporter,
        new_string: &str,
    ) -> Result<u64, SspError> {
        let n = self.next_state_num;
        self.next_state_num += 1;

        // Step 1: record the new state (not yet sent).
        let new_state = State {
            string: new_string.to_string(),
            num: n,
            time_sent: None,
        };

        // Step 2: select the reference state.
        let assumed = n - 1;
        let known = self.inflight.highest_ack();
        let old_num = self.select_reference(assumed, known, &transporter.rto());

        // Step 3: diff against the reference.
        let old_string = &self
            .states
            .get(&old_num)
            .expect("reference state always present")
            .string;
        let diff: Vec<Opcode> = generate_patch(old_string, new_string);

        // Step 4: throwaway_num, preserving the spec's formula verbatim,
        // including its odd behavior when highest_ack is still 0 (see
        // DESIGN.md).
        let throwaway_num = self.throwaway_num(known);

        // Step 5: send and record bookkeeping.
        transporter
            .send(old_num, n, known, throwaway_num, diff)
            .await?;

        let mut new_state = new_state;
        new_state.time_sent = Some(Instant::now());
        self.states.insert(n, new_state);
        self.inflight.sent(n, Some(old_num));
        self.prune_acked_states(known, throwaway_num);

        debug!(state_number = n, old_num, known, throwaway_num, "sent state");
        Ok(n)
    }

    /// Process an incoming acknowledgment (itself a Transport Instruction
    /// with `ack_num` set to the receiver's newly applied state number).
    pub fn on_receive(&mut self, ack_num: u64) {
        self.inflight.acked(ack_num);
    }

    fn select_reference(
        &mut self,
        assumed: u64,
        known: u64,
        rto: &Option<std::time::Duration>,
    ) -> u64 {
        // No RTT sample yet means the staleness window can't be evaluated.
        // Fall back to the classic Mosh policy: always diff from the
        // most-recently-sent state (spec.md §4.F Rationale; this is also
        // what makes λ = 0 behave as documented before the first ack).
        let Some(rto) = rto else {
            return assumed;
        };
        let assumed_state = self.states.get(&assumed);
        let within_staleness_window = assumed_state
            .and_then(|s| s.time_sent)
            .is_some_and(|time_sent| Instant::now().duration_since(time_sent) < *rto);
        if within_staleness_window {
            if self.rng.gen::<f64>() < self.lambda {
                known
            } else {
                assumed
            }
        } else {
            known
        }
    }

    fn throwaway_num(&self, known: u64) -> i64 {
        let term_known = known as i64 - 1;
        let term_dep = match self.inflight.min_inflight_dependency() {
            Some(d) => d as i64 - 1,
            None => i64::MAX,
        };
        0i64.min(term_known).min(term_dep)
    }

    /// Drop states the peer has told us it no longer needs. Always keeps
    /// state 0, the most-recently-produced state (the potential "assumed"
    /// reference), and `known` (the potential "known" reference) — dropping
    /// either reference state would panic the next `select_reference` call
    /// that picks it. Efficiency only, per spec.md §3 Lifecycle.
    fn prune_acked_states(&mut self, known: u64, throwaway_num: i64) {
        let keep_latest = self.next_state_num.saturating_sub(1);
        self.states.retain(|&num, _| {
            num == 0 || num == keep_latest || num >= known || num as i64 > throwaway_num
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_numbers_increase_monotonically() {
        let sender = Sender::new(0.3, Some(1));
        assert_eq!(sender.next_state_num, 1);
    }

    #[test]
    fn throwaway_num_is_non_positive_while_unacked() {
        // Before any ack, highest_ack = 0 and there's no inflight
        // dependency yet, so the formula's three terms are 0, -1, and
        // +inf-ish: min is -1. This is the "odd" behavior spec.md flags
        // explicitly and asks implementations to preserve.
        let sender = Sender::new(0.3, Some(1));
        assert_eq!(sender.throwaway_num(0), -1);
    }

    #[test]
    fn first_send_always_diffs_against_state_zero() {
        let mut sender = Sender::new(0.3, Some(42));
        // No RTO estimate exists yet, so the reference is always `assumed`,
        // which also happens to be 0 before anything has been sent.
        let old_num = sender.select_reference(0, 0, &None);
        assert_eq!(old_num, 0);
    }

    #[test]
    fn on_receive_advances_highest_ack() {
        let mut sender = Sender::new(0.3, Some(1));
        sender.inflight.sent(1, Some(0));
        sender.on_receive(1);
        assert_eq!(sender.highest_ack(), 1);
    }

    #[test]
    fn without_rto_estimate_reference_is_always_assumed() {
        let mut sender = Sender::new(1.0, Some(7));
        sender.states.insert(
            1,
            State {
                string: "x".into(),
                num: 1,
                time_sent: Some(Instant::now()),
            },
        );
        // No RTO estimate yet (`None`): the staleness window can't be
        // evaluated, so the classic Mosh policy applies regardless of
        // lambda — always diff from the most-recently-sent state.
        let old_num = sender.select_reference(1, 0, &None);
        assert_eq!(old_num, 1);
    }

    #[test]
    fn pruning_never_drops_the_known_reference_state() {
        let mut sender = Sender::new(0.3, Some(1));
        sender.states.insert(
            1,
            State {
                string: "a".into(),
                num: 1,
                time_sent: Some(Instant::now()),
            },
        );
        sender.states.insert(
            2,
            State {
                string: "ab".into(),
                num: 2,
                time_sent: Some(Instant::now()),
            },
        );
        sender.next_state_num = 3;
        // known = 1: this state must survive pruning even though
        // throwaway_num (<= known - 1 = 0) would otherwise drop it.
        sender.prune_acked_states(1, sender.throwaway_num(1));
        assert!(sender.states.contains_key(&1));
    }
}
