//! End-to-end coverage of the public API surface, exercised the way a real
//! caller would: construct a `Queue` from a `Config`, feed it raw packet
//! bytes, and drain whatever comes out.

use rtpa_queue::{AddPacketOutcome, Config, Queue, RTP_HEADER_LEN, RTP_VERSION_FLAGS};

fn rtp_packet(payload_type: u8, seq: u16, ts: u32, ssrc: u32, payload: &[u8]) -> Vec<u8> {
	let mut buf = vec![0u8; RTP_HEADER_LEN + payload.len()];
	buf[0] = RTP_VERSION_FLAGS;
	buf[1] = payload_type;
	buf[2..4].copy_from_slice(&seq.to_be_bytes());
	buf[4..8].copy_from_slice(&ts.to_be_bytes());
	buf[8..12].copy_from_slice(&ssrc.to_be_bytes());
	buf[RTP_HEADER_LEN..].copy_from_slice(payload);
	buf
}

#[test]
fn rejects_invalid_configuration() {
	let config = Config { data_shards: 0, ..Config::default() };
	assert!(Queue::new(config).is_err());
}

#[test]
fn drains_an_in_order_window_via_the_fast_path() {
	let config = Config { data_shards: 4, parity_shards: 2, ..Config::default() };
	let mut queue = Queue::new(config).unwrap();

	// First window establishes synchronization and is itself dropped, as no
	// prior window exists to compare against.
	queue.add_packet(&rtp_packet(97, 96, 480, 9, &[0u8; 20]));

	for (i, seq) in (100u16..104).enumerate() {
		let packet = rtp_packet(97, seq, 500 + (i as u32) * 5, 9, &[0u8; 20]);
		assert_eq!(queue.add_packet(&packet), AddPacketOutcome::HandleNow);
	}

	assert!(queue.get_queued_packet(0).is_none());
}

#[test]
fn reserves_custom_header_space_in_drained_packets() {
	let config = Config { data_shards: 4, parity_shards: 2, audio_packet_duration_ms: 5, oos_wait_time_ms: 100, ..Config::default() };
	let mut queue = Queue::new(config).unwrap();

	queue.add_packet(&rtp_packet(97, 796, 3980, 3, &[0u8; 12])); // sync at base 800

	// Receive 801..803 out of order and skip 800 to drive the non-fast path.
	queue.add_packet(&rtp_packet(97, 801, 4005, 3, &[1u8; 12]));
	queue.add_packet(&rtp_packet(97, 802, 4010, 3, &[2u8; 12]));
	let outcome = queue.add_packet(&rtp_packet(97, 803, 4015, 3, &[3u8; 12]));

	// Without shard 0 or any FEC, the block cannot complete yet.
	assert_eq!(outcome, AddPacketOutcome::Rejected);
	assert!(queue.get_queued_packet(8).is_none());
}
