//! Thin demo binary wiring the ssp-protocol core to stdin/stdout.
//!
//! This stands in for the interactive terminal I/O loop the protocol spec
//! explicitly keeps out of the core crate's scope: it feeds lines read from
//! stdin to a [`Sender`] as "new local string" events, or prints every
//! state a [`Receiver`] applies. It is not itself part of the protocol.

use clap::{Parser, Subcommand};
use ssp_protocol::core::Config;
use ssp_protocol::sync::{ReceiveOutcome, Receiver, Sender};
use ssp_protocol::transport::Transporter;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "ssp-cli", about = "Demo driver for the SSP state-sync core")]
struct Cli {
    #[command(subcommand)]
    role: RoleArgs,

    /// Probability of diffing against the known (acked) state rather than
    /// the most-recently-sent one, when it's still fresh.
    #[arg(long, default_value_t = 0.3)]
    lambda: f64,

    /// Seed the reference-state RNG for a reproducible run.
    #[arg(long)]
    rng_seed: Option<u64>,

    /// Signal strength, in dBm, stamped into outgoing packets.
    #[arg(long, default_value_t = -50)]
    signal_dbm: i8,
}

#[derive(Subcommand)]
enum RoleArgs {
    /// Read lines from stdin and synchronize them to a receiver.
    Send {
        /// Local UDP port to bind.
        #[arg(long)]
        bind_port: u16,
        /// Receiver's host.
        #[arg(long)]
        peer_host: String,
        /// Receiver's port.
        #[arg(long)]
        peer_port: u16,
    },
    /// Reconstruct and print every state sent by a sender.
    Recv {
        /// Local UDP port to bind.
        #[arg(long)]
        bind_port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.role {
        RoleArgs::Send {
            bind_port,
            peer_host,
            peer_port,
        } => run_sender(bind_port, peer_host, peer_port, cli.lambda, cli.rng_seed, cli.signal_dbm).await,
        RoleArgs::Recv { bind_port } => run_receiver(bind_port, cli.signal_dbm).await,
    }
}

async fn run_sender(
    bind_port: u16,
    peer_host: String,
    peer_port: u16,
    lambda: f64,
    rng_seed: Option<u64>,
    signal_dbm: i8,
) -> anyhow::Result<()> {
    let mut config = Config::sender(bind_port, peer_host, peer_port);
    config.lambda = lambda;
    config.rng_seed = rng_seed;
    config.signal_dbm = signal_dbm;

    let mut transporter = Transporter::bind(&config).await?;
    let mut sender = Sender::new(config.lambda, config.rng_seed);

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(text) => {
                        let num = sender.send_message(&mut transporter, &text).await?;
                        tracing::info!(state_number = num, "sent");
                    }
                    None => break, // stdin closed
                }
            }
            ack = transporter.recv() => {
                let instruction = ack?;
                sender.on_receive(instruction.ack_num);
                tracing::debug!(ack_num = instruction.ack_num, "acked");
            }
        }
    }
    Ok(())
}

async fn run_receiver(bind_port: u16, signal_dbm: i8) -> anyhow::Result<()> {
    let mut config = Config::receiver(bind_port);
    config.signal_dbm = signal_dbm;

    let mut transporter = Transporter::bind(&config).await?;
    let mut receiver = Receiver::new();

    loop {
        let instruction = transporter.recv().await?;
        match receiver.on_receive(&mut transporter, &instruction).await? {
            ReceiveOutcome::Applied { new_num, string } => {
                println!("[{new_num}] {string}");
            }
            ReceiveOutcome::Discarded { missing_old_num } => {
                tracing::warn!(missing_old_num, "discarded instruction");
            }
        }
    }
}
