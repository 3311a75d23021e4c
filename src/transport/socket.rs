//! The `Transporter`: owns the UDP socket, frames outgoing instructions
//! into datagrams, unframes incoming ones, and — for the sender role only
//! — feeds the timestamp echo back into RTT/RTO estimation.
//!
//! Mirrors the teacher crate's `NomadSocket` (an `Arc`-free tokio
//! `UdpSocket` wrapper owned by a single task) but speaks this protocol's
//! datagram/instruction framing instead of `DataFrame`.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, trace};

use crate::core::{Config, Instruction, Opcode, Packet, Role, SspError};
use crate::transport::timing::{wrapped_rtt_seconds, RttEstimator};

/// Largest payload we'll ever try to receive in one datagram. Generous for
/// a text-diffing protocol; well under the practical UDP/IPv4 ceiling.
const RECV_BUFFER_SIZE: usize = 65_507;

/// Owns the UDP socket and the per-endpoint framing/timing state.
pub struct Transporter {
    socket: UdpSocket,
    role: Role,
    session_start: Instant,
    seq: u64,
    last_peer_ts: Option<u16>,
    peer_addr: Option<SocketAddr>,
    signal_dbm: i8,
    rtt: RttEstimator,
}

impl Transporter {
    /// Bind a socket per `config`, resolving the peer address if one is
    /// already known (senders always know it; receivers may not until the
    /// first packet arrives).
    pub async fn bind(config: &Config) -> Result<Self, SspError> {
        let bind_addr = format!("{}:{}", config.bind_host, config.bind_port);
        let socket = UdpSocket::bind(&bind_addr).await?;

        let peer_addr = match (&config.peer_host, config.peer_port) {
            (Some(host), Some(port)) => {
                let target = format!("{host}:{port}");
                let resolved = lookup_host(&target)
                    .await?
                    .next()
                    .ok_or_else(|| SspError::Config(format!("could not resolve {target}")))?;
                Some(resolved)
            }
            _ => None,
        };

        debug!(bind_addr, role = ?config.role, "transporter bound");

        Ok(Self {
            socket,
            role: config.role,
            session_start: Instant::now(),
            seq: 0,
            last_peer_ts: None,
            peer_addr,
            signal_dbm: config.signal_dbm,
            rtt: RttEstimator::new(),
        })
    }

    /// The peer address, once known.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// The local address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, SspError> {
        Ok(self.socket.local_addr()?)
    }

    /// Override the learned/configured peer address. Mainly useful for
    /// tests that bind both ends to an ephemeral port and need to wire them
    /// up after the fact; a long-lived receiver ordinarily learns its peer
    /// from the first packet it receives.
    pub fn set_peer_addr(&mut self, addr: SocketAddr) {
        self.peer_addr = Some(addr);
    }

    /// Current RTO estimate. Only ever populated on the sender role, since
    /// only the sender runs RTT sampling (spec.md §4.E).
    pub fn rto(&self) -> Option<Duration> {
        self.rtt.rto()
    }

    /// Send one Transport Instruction, framed into a datagram.
    pub async fn send(
        &mut self,
        old_num: u64,
        new_num: u64,
        ack_num: u64,
        throwaway_num: i64,
        diff: Vec<Opcode>,
    ) -> Result<(), SspError> {
        let peer = self.peer_addr.ok_or(SspError::PeerUnknown)?;
        let instruction = Instruction {
            old_num,
            new_num,
            ack_num,
            throwaway_num,
            diff,
        };
        let payload = instruction.encode();
        let now_ms = self.now_ms_truncated();
        // ts_reply echoes the peer's most recent ts, or zero before any
        // packet has been received (spec.md §3 Invariants; see DESIGN.md
        // for why this differs from the original source's "now" fallback).
        let ts_reply = self.last_peer_ts.unwrap_or(0);
        let packet = Packet::new(
            self.role.direction_bit(),
            self.seq,
            now_ms,
            ts_reply,
            self.signal_dbm,
            payload,
        )?;
        self.seq += 1;
        self.socket.send_to(&packet.pack(), peer).await?;
        trace!(old_num, new_num, ack_num, throwaway_num, "sent instruction");
        Ok(())
    }

    /// Receive and decode the next instruction, suspending until one
    /// arrives. Updates the RTT estimate (sender role only) and the peer
    /// address (useful for a receiver that doesn't know it yet).
    pub async fn recv(&mut self) -> Result<Instruction, SspError> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let (n, from) = self.socket.recv_from(&mut buf).await?;
        let packet = Packet::unpack(&buf[..n])?;
        self.peer_addr = Some(from);

        if matches!(self.role, Role::Sender) {
            let now_ms = self.now_ms_truncated();
            let r = wrapped_rtt_seconds(packet.ts_reply, now_ms);
            self.rtt.on_sample(r);
        }
        self.last_peer_ts = Some(packet.ts);

        let instruction = Instruction::decode(&packet.payload)?;
        trace!(
            old_num = instruction.old_num,
            new_num = instruction.new_num,
            "received instruction"
        );
        Ok(instruction)
    }

    /// Like [`recv`](Self::recv), but gives up after `timeout` with
    /// [`SspError::SocketTimeout`].
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Instruction, SspError> {
        tokio::time::timeout(timeout, self.recv())
            .await
            .map_err(|_| SspError::SocketTimeout)?
    }

    fn now_ms_truncated(&self) -> u16 {
        (self.session_start.elapsed().as_millis() as u64 & 0xFFFF) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{generate_patch, Role};

    async fn paired() -> (Transporter, Transporter) {
        let mut sender_cfg = Config::receiver(0); // no peer yet; we wire it up below
        sender_cfg.bind_host = "127.0.0.1".to_string();
        let mut sender = Transporter::bind(&sender_cfg).await.unwrap();
        sender.role = Role::Sender;
        let mut receiver_cfg = Config::receiver(0);
        receiver_cfg.bind_host = "127.0.0.1".to_string();
        let mut receiver = Transporter::bind(&receiver_cfg).await.unwrap();

        let sender_addr = sender.socket.local_addr().unwrap();
        let receiver_addr = receiver.socket.local_addr().unwrap();
        sender.peer_addr = Some(receiver_addr);
        receiver.peer_addr = Some(sender_addr);
        (sender, receiver)
    }

    #[tokio::test]
    async fn send_then_recv_roundtrips_an_instruction() {
        let (mut sender, mut receiver) = paired().await;
        let diff = generate_patch("", "abc");
        sender.send(0, 1, 0, 0, diff.clone()).await.unwrap();
        let instruction = receiver.recv().await.unwrap();
        assert_eq!(instruction.old_num, 0);
        assert_eq!(instruction.new_num, 1);
        assert_eq!(instruction.diff, diff);
    }

    #[tokio::test]
    async fn sender_updates_rto_after_echoed_timestamp() {
        let (mut sender, mut receiver) = paired().await;
        assert!(sender.rto().is_none());

        sender.send(0, 1, 0, 0, vec![]).await.unwrap();
        let instruction = receiver.recv().await.unwrap();
        receiver
            .send(0, 0, instruction.new_num, instruction.new_num as i64, vec![])
            .await
            .unwrap();
        sender.recv().await.unwrap();

        assert!(sender.rto().is_some());
        // The receiver side never runs RTT estimation.
        assert!(receiver.rto().is_none());
    }

    #[tokio::test]
    async fn send_without_peer_is_peer_unknown() {
        let cfg = Config::receiver(0);
        let mut t = Transporter::bind(&cfg).await.unwrap();
        let err = t.send(0, 1, 0, 0, vec![]).await.unwrap_err();
        assert!(matches!(err, SspError::PeerUnknown));
    }

    #[tokio::test]
    async fn recv_timeout_fires_when_nothing_arrives() {
        let cfg = Config::receiver(0);
        let mut t = Transporter::bind(&cfg).await.unwrap();
        let err = t
            .recv_timeout(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, SspError::SocketTimeout));
    }
}
