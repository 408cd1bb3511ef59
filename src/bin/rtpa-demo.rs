//! Small demo binary: reads RTP audio and FEC packets off a UDP socket and
//! prints what the queue does with each one. Async only at the network edge;
//! the queue itself is driven synchronously from the receive loop, per the
//! crate's single-owner concurrency model.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::UdpSocket;

use rtpa_queue::{AddPacketOutcome, Config, Queue};

#[derive(Parser)]
#[clap(version)]
struct Args {
	/// Address to listen on for RTP audio/FEC traffic.
	#[clap(long, default_value = "0.0.0.0:48000")]
	listen: String,

	/// Optional TOML configuration file; falls back to protocol defaults.
	#[clap(long)]
	config: Option<PathBuf>,

	/// Bytes of header space to reserve ahead of each drained packet.
	#[clap(long, default_value_t = 0)]
	custom_header_len: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt::init();

	let args = Args::parse();

	let config = match &args.config {
		Some(path) => Config::read_from_file(path)?,
		None => Config::default(),
	};

	let mut queue = Queue::new(config)?;
	let socket = UdpSocket::bind(&args.listen).await?;
	tracing::info!("Listening for audio RTP traffic on {}", args.listen);

	let mut buf = vec![0u8; 2048];
	loop {
		let (len, from) = socket.recv_from(&mut buf).await?;
		let packet = &buf[..len];

		match queue.add_packet(packet) {
			AddPacketOutcome::Rejected => {},
			AddPacketOutcome::HandleNow => {
				tracing::debug!("Handling in-order packet from {from} directly ({len} bytes)");
			},
			AddPacketOutcome::PacketReady => {
				while let Some(queued) = queue.get_queued_packet(args.custom_header_len) {
					if queued.is_placeholder() {
						tracing::debug!("Emitting loss-concealment placeholder");
					} else {
						tracing::debug!("Emitting reassembled packet ({} bytes)", queued.length);
					}
				}
			},
		}
	}
}
