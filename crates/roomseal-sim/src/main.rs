//! Roomseal room simulator binary.
//!
//! # Usage
//!
//! ```bash
//! # Three participants, alice sends one message
//! roomseal-sim -p alice -p bob -p carol --message "hello room"
//!
//! # Pick the sender and show every envelope decision
//! roomseal-sim -p alice -p bob --sender bob -m "hi" --log-level debug
//! ```

use clap::Parser;
use roomseal_core::SessionConfig;
use roomseal_sim::{Room, RoomEvent, SystemEnv};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Roomseal room simulator
#[derive(Parser, Debug)]
#[command(name = "roomseal-sim")]
#[command(about = "Run an in-memory end-to-end encrypted room")]
#[command(version)]
struct Args {
    /// Participant name (repeat for each participant, at least two)
    #[arg(short, long = "participant", required = true, num_args = 1)]
    participants: Vec<String>,

    /// Participant that sends the message (defaults to the first)
    #[arg(short, long)]
    sender: Option<String>,

    /// Message to send once keys are exchanged
    #[arg(short, long, default_value = "hello")]
    message: String,

    /// Name of the room's broadcast pseudo-peer
    #[arg(long, default_value = roomseal_core::config::DEFAULT_BROADCAST_CHANNEL)]
    broadcast_channel: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    if args.participants.len() < 2 {
        return Err("a room needs at least two participants".into());
    }
    let sender = args.sender.clone().unwrap_or_else(|| args.participants[0].clone());

    let config = SessionConfig::default().with_broadcast_channel(args.broadcast_channel);
    let mut room = Room::new(SystemEnv::new(), config);

    for name in &args.participants {
        room.join(name)?;
    }
    let exchanged = room.run()?;
    tracing::info!(envelopes = exchanged, "key exchange complete");

    for name in room.participants() {
        let Some(session) = room.session(name) else { continue };
        for peer in room.participants().filter(|peer| *peer != name) {
            match session.peer_fingerprint(peer) {
                Some(fingerprint) => tracing::info!(%name, %peer, %fingerprint, "peer fingerprint"),
                None => tracing::warn!(%name, %peer, "no key for peer"),
            }
        }
    }
    room.drain_events();

    room.send(&sender, &args.message)?;
    room.run()?;

    let mut delivered = 0usize;
    let mut warned = 0usize;
    for event in room.events() {
        match event {
            RoomEvent::Delivered { .. } => delivered += 1,
            RoomEvent::Warned { .. } | RoomEvent::Rejected { .. } => warned += 1,
            RoomEvent::KeyPinned { .. } => {},
        }
    }
    tracing::info!(%sender, delivered, warned, "room run finished");

    Ok(())
}
