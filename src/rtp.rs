//! Wire-format structures for the two packet kinds this queue understands:
//! plain RTP audio packets and RTP-wrapped FEC parity packets.

use byteorder::{BigEndian, ByteOrder};

/// Size in bytes of the fixed RTP header.
pub const RTP_HEADER_LEN: usize = 12;

/// Size in bytes of the audio FEC header that follows the RTP header in
/// `PT_FEC` packets.
pub const FEC_HEADER_LEN: usize = 12;

/// RTP version/flags byte used when synthesizing a recovered data packet's
/// header: RTPv2, no padding, no extension, no CSRCs.
pub const RTP_VERSION_FLAGS: u8 = 0x80;

/// The 12-byte RTP header. Only the fields the queue engine interprets are
/// decoded; any other bits present on the wire are preserved verbatim by
/// copying the whole packet rather than re-serializing it, except when a
/// header is synthesized for a recovered shard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RtpHeader {
	pub version_flags: u8,
	pub payload_type: u8,
	pub sequence_number: u16,
	pub timestamp: u32,
	pub ssrc: u32,
}

impl RtpHeader {
	pub fn parse(bytes: &[u8]) -> Option<Self> {
		if bytes.len() < RTP_HEADER_LEN {
			return None;
		}

		Some(Self {
			version_flags: bytes[0],
			payload_type: bytes[1],
			sequence_number: BigEndian::read_u16(&bytes[2..4]),
			timestamp: BigEndian::read_u32(&bytes[4..8]),
			ssrc: BigEndian::read_u32(&bytes[8..12]),
		})
	}

	/// Overwrites the header fields of an existing packet buffer in place,
	/// leaving the payload (and any bytes beyond the 12-byte header) alone.
	/// Used to synthesize the header of a shard recovered via Reed-Solomon.
	pub fn write_into(&self, buf: &mut [u8]) {
		debug_assert!(buf.len() >= RTP_HEADER_LEN);

		buf[0] = self.version_flags;
		buf[1] = self.payload_type;
		BigEndian::write_u16(&mut buf[2..4], self.sequence_number);
		BigEndian::write_u32(&mut buf[4..8], self.timestamp);
		BigEndian::write_u32(&mut buf[8..12], self.ssrc);
	}
}

/// The FEC header carried after the RTP header in `PT_FEC` packets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FecHeader {
	/// Payload type of the data packets this block protects.
	pub payload_type: u8,
	pub fec_shard_index: u8,
	pub base_sequence_number: u16,
	pub base_timestamp: u32,
	pub ssrc: u32,
}

impl FecHeader {
	pub fn parse(bytes: &[u8]) -> Option<Self> {
		if bytes.len() < FEC_HEADER_LEN {
			return None;
		}

		Some(Self {
			payload_type: bytes[0],
			fec_shard_index: bytes[1],
			base_sequence_number: BigEndian::read_u16(&bytes[2..4]),
			base_timestamp: BigEndian::read_u32(&bytes[4..8]),
			ssrc: BigEndian::read_u32(&bytes[8..12]),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_rtp_header() {
		#[rustfmt::skip]
		let bytes = [
			0x80, 97,
			0x00, 0x65, // sequence_number = 101
			0x00, 0x00, 0x01, 0xf9, // timestamp = 505
			0x00, 0x00, 0x00, 0x01, // ssrc = 1
			0xaa, 0xbb, // trailing payload, untouched
		];

		let header = RtpHeader::parse(&bytes).unwrap();
		assert_eq!(header.version_flags, 0x80);
		assert_eq!(header.payload_type, 97);
		assert_eq!(header.sequence_number, 101);
		assert_eq!(header.timestamp, 505);
		assert_eq!(header.ssrc, 1);
	}

	#[test]
	fn rejects_short_buffers() {
		assert!(RtpHeader::parse(&[0u8; RTP_HEADER_LEN - 1]).is_none());
		assert!(FecHeader::parse(&[0u8; FEC_HEADER_LEN - 1]).is_none());
	}

	#[test]
	fn write_into_overwrites_only_header_bytes() {
		let mut buf = vec![0u8; RTP_HEADER_LEN + 4];
		buf[RTP_HEADER_LEN..].copy_from_slice(&[1, 2, 3, 4]);

		let header = RtpHeader {
			version_flags: RTP_VERSION_FLAGS,
			payload_type: 97,
			sequence_number: 202,
			timestamp: 1010,
			ssrc: 0xdead_beef,
		};
		header.write_into(&mut buf);

		assert_eq!(RtpHeader::parse(&buf).unwrap(), header);
		assert_eq!(&buf[RTP_HEADER_LEN..], &[1, 2, 3, 4]);
	}

	#[test]
	fn parses_fec_header() {
		#[rustfmt::skip]
		let bytes = [
			97, // payload_type
			1, // fec_shard_index
			0x00, 0xc8, // base_sequence_number = 200
			0x00, 0x00, 0x03, 0xe8, // base_timestamp = 1000
			0x00, 0x00, 0x00, 0x2a, // ssrc = 42
		];

		let header = FecHeader::parse(&bytes).unwrap();
		assert_eq!(header.payload_type, 97);
		assert_eq!(header.fec_shard_index, 1);
		assert_eq!(header.base_sequence_number, 200);
		assert_eq!(header.base_timestamp, 1000);
		assert_eq!(header.ssrc, 42);
	}
}
