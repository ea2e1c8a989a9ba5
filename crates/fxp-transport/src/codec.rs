//! Wire packet framing: `checksum(2, BE) || seq(4, LE) || payload`.
//!
//! Both data segments and ACKs use the same frame. An ACK is a packet whose
//! payload is the literal bytes `ACK`; the end-of-stream sentinel is a data
//! packet whose payload is empty and whose `seq` equals `totalSeq`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Minimum valid packet length: 2-byte checksum + 4-byte seq, no payload.
pub const MIN_PACKET_LEN: usize = 6;

/// Literal ACK payload, matching the reference implementation.
pub const ACK_PAYLOAD: &[u8] = b"ACK";

/// A decoded wire packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub seq: u32,
    pub payload: Bytes,
}

impl Packet {
    pub fn is_ack(&self) -> bool {
        self.payload.as_ref() == ACK_PAYLOAD
    }

    /// Empty-payload data packet marking end of stream.
    pub fn is_sentinel(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Serialize `seq` and `payload` into a checksummed wire packet.
pub fn build(seq: u32, payload: &[u8]) -> Bytes {
    let mut body = BytesMut::with_capacity(4 + payload.len());
    body.put_u32_le(seq);
    body.put_slice(payload);

    let checksum = internet_checksum(&body);

    let mut out = BytesMut::with_capacity(2 + body.len());
    out.put_u16(checksum);
    out.put_slice(&body);
    out.freeze()
}

/// Build an ACK packet for `seq`.
pub fn build_ack(seq: u32) -> Bytes {
    build(seq, ACK_PAYLOAD)
}

/// Parse a wire packet, validating length and checksum.
///
/// Returns `None` for anything shorter than [`MIN_PACKET_LEN`] or with a
/// checksum mismatch — both cases are silently dropped by callers, never
/// surfaced as errors.
pub fn parse(raw: &[u8]) -> Option<Packet> {
    if raw.len() < MIN_PACKET_LEN {
        return None;
    }

    let recv_checksum = u16::from_be_bytes([raw[0], raw[1]]);
    let body = &raw[2..];
    if internet_checksum(body) != recv_checksum {
        return None;
    }

    let mut rest = body;
    let seq = rest.get_u32_le();
    let payload = Bytes::copy_from_slice(rest);

    Some(Packet { seq, payload })
}

/// 16-bit Internet-checksum-family sum over `data`: one's-complement sum
/// of 16-bit big-endian words with end-around carry, then complemented.
///
/// Deterministic; any single-bit flip in `data` changes the result, so a
/// corrupted packet never passes the comparison in [`parse`].
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum += u16::from_be_bytes([word[0], word[1]]) as u32;
    }
    if let [last] = *chunks.remainder() {
        sum += (last as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn roundtrip_with_payload() {
        let built = build(42, b"hello");
        let parsed = parse(&built).unwrap();
        assert_eq!(parsed.seq, 42);
        assert_eq!(parsed.payload, Bytes::from_static(b"hello"));
    }

    #[test]
    fn roundtrip_empty_payload_is_sentinel() {
        let built = build(7, b"");
        let parsed = parse(&built).unwrap();
        assert_eq!(parsed.seq, 7);
        assert!(parsed.is_sentinel());
    }

    #[test]
    fn ack_payload_detected() {
        let built = build_ack(5);
        let parsed = parse(&built).unwrap();
        assert_eq!(parsed.seq, 5);
        assert!(parsed.is_ack());
    }

    #[test]
    fn short_packet_rejected() {
        assert!(parse(&[0u8; 5]).is_none());
        assert!(parse(&[]).is_none());
    }

    #[test]
    fn checksum_mismatch_rejected() {
        let mut built = build(1, b"data").to_vec();
        built[0] ^= 0xFF;
        assert!(parse(&built).is_none());
    }

    #[test]
    fn single_bit_flip_detected() {
        let built = build(1, b"data").to_vec();
        for bit in 0..built.len() * 8 {
            let mut corrupted = built.clone();
            let byte = bit / 8;
            let mask = 1u8 << (bit % 8);
            corrupted[byte] ^= mask;
            assert!(parse(&corrupted).is_none(), "bit {bit} flip not detected");
        }
    }

    #[test]
    fn min_packet_len_accepted() {
        let built = build(0, b"");
        assert_eq!(built.len(), MIN_PACKET_LEN);
        assert!(parse(&built).is_some());
    }

    proptest! {
        #[test]
        fn roundtrip_prop(seq: u32, payload in prop::collection::vec(any::<u8>(), 0..512)) {
            let built = build(seq, &payload);
            let parsed = parse(&built).unwrap();
            prop_assert_eq!(parsed.seq, seq);
            prop_assert_eq!(parsed.payload.as_ref(), payload.as_slice());
        }
    }
}
