//! SCTP port mutation (spec §4.3 `set_sctp`).
//!
//! SCTP checksums use CRC32c over the whole packet rather than a pseudo
//! header, and intermediate middleboxes almost never validate them —
//! which means a deliberately-bogus checksum (injected for fault testing)
//! must survive a port rewrite unchanged in its *wrongness*. Grounded on
//! the original `set_sctp`'s XOR carry-through: the delta between the old
//! stored value and the old *correct* value is preserved across the port
//! change instead of simply recomputing and overwriting.

use crate::checksum::{crc32c, csum_replace2};
use crate::error::ExecError;
use crate::key::FlowKey;
use crate::packet::{ChecksumMode, Packet};

pub const SCTP_CHECKSUM_OFFSET: usize = 8;
const SCTP_HDR_LEN: usize = 12;

pub fn set_sctp(packet: &mut Packet, key: &mut FlowKey, src: Option<u16>, dst: Option<u16>) -> Result<(), ExecError> {
    packet.ensure_writable(packet.transport_offset() - packet.mac_offset() + SCTP_HDR_LEN)?;

    let old_csum = {
        let hdr = packet.transport_header_mut();
        let old = u32::from_be_bytes(hdr[SCTP_CHECKSUM_OFFSET..SCTP_CHECKSUM_OFFSET + 4].try_into().unwrap());
        hdr[SCTP_CHECKSUM_OFFSET..SCTP_CHECKSUM_OFFSET + 4].copy_from_slice(&[0; 4]);
        old
    };
    let old_correct = crc32c(packet.transport_header());
    let old_src_word = u16::from_be_bytes([packet.transport_header()[0], packet.transport_header()[1]]);
    let old_dst_word = u16::from_be_bytes([packet.transport_header()[2], packet.transport_header()[3]]);

    {
        let hdr = packet.transport_header_mut();
        if let Some(src) = src {
            hdr[0..2].copy_from_slice(&src.to_be_bytes());
        }
        if let Some(dst) = dst {
            hdr[2..4].copy_from_slice(&dst.to_be_bytes());
        }
    }
    let new_correct = crc32c(packet.transport_header());
    let new_csum = old_csum ^ old_correct ^ new_correct;
    packet.transport_header_mut()[SCTP_CHECKSUM_OFFSET..SCTP_CHECKSUM_OFFSET + 4]
        .copy_from_slice(&new_csum.to_be_bytes());

    // SCTP's own checksum is CRC32c, not part of the additive one's-complement
    // family `complete_csum` tracks — its carry-through above is independent
    // of this. The full-packet aggregate still covers every byte in the
    // packet regardless of protocol, so the port bytes are corrected here too.
    if packet.checksum_mode() == ChecksumMode::Complete {
        let mut acc = packet.complete_csum();
        if let Some(src) = src {
            acc = csum_replace2(acc, old_src_word, src);
        }
        if let Some(dst) = dst {
            acc = csum_replace2(acc, old_dst_word, dst);
        }
        packet.set_complete_csum(acc);
    }

    if let Some(src) = src {
        key.tp.src = src;
    }
    if let Some(dst) = dst {
        key.tp.dst = dst;
    }
    packet.hash_clear();
    Ok(())
}

#[cfg(test)]
mod sctp_tests {
    use super::*;
    use crate::packet::ChecksumMode;

    fn sample() -> Packet {
        let mut bytes = alloc::vec![0u8; 14 + 20 + 12];
        bytes[14 + 9] = 132;
        let mut p = Packet::from_frame(&bytes, 14, 20, ChecksumMode::None);
        let correct = {
            let hdr = p.transport_header_mut();
            hdr[SCTP_CHECKSUM_OFFSET..SCTP_CHECKSUM_OFFSET + 4].copy_from_slice(&[0; 4]);
            crc32c(hdr)
        };
        p.transport_header_mut()[SCTP_CHECKSUM_OFFSET..SCTP_CHECKSUM_OFFSET + 4]
            .copy_from_slice(&correct.to_be_bytes());
        p
    }

    #[test]
    fn correct_checksum_stays_correct_after_port_change() {
        let mut p = sample();
        let mut key = FlowKey::default();
        set_sctp(&mut p, &mut key, Some(12345), None).unwrap();

        let stored = u32::from_be_bytes(
            p.transport_header()[SCTP_CHECKSUM_OFFSET..SCTP_CHECKSUM_OFFSET + 4]
                .try_into()
                .unwrap(),
        );
        let mut scratch = p.transport_header().to_vec();
        scratch[SCTP_CHECKSUM_OFFSET..SCTP_CHECKSUM_OFFSET + 4].copy_from_slice(&[0; 4]);
        assert_eq!(stored, crc32c(&scratch));
    }

    #[test]
    fn deliberately_bogus_checksum_stays_equally_bogus() {
        let mut p = sample();
        let original_correct = {
            let mut scratch = p.transport_header().to_vec();
            scratch[SCTP_CHECKSUM_OFFSET..SCTP_CHECKSUM_OFFSET + 4].copy_from_slice(&[0; 4]);
            crc32c(&scratch)
        };
        // corrupt the stored checksum to simulate fault injection
        let hdr = p.transport_header_mut();
        let bogus = original_correct ^ 0xFFFF_FFFF;
        hdr[SCTP_CHECKSUM_OFFSET..SCTP_CHECKSUM_OFFSET + 4].copy_from_slice(&bogus.to_be_bytes());

        let mut key = FlowKey::default();
        set_sctp(&mut p, &mut key, Some(777), None).unwrap();

        let stored = u32::from_be_bytes(
            p.transport_header()[SCTP_CHECKSUM_OFFSET..SCTP_CHECKSUM_OFFSET + 4]
                .try_into()
                .unwrap(),
        );
        let mut scratch = p.transport_header().to_vec();
        scratch[SCTP_CHECKSUM_OFFSET..SCTP_CHECKSUM_OFFSET + 4].copy_from_slice(&[0; 4]);
        let correct_now = crc32c(&scratch);

        // the error delta (stored XOR correct) must survive unchanged
        assert_eq!(stored ^ correct_now, bogus ^ original_correct);
    }

    #[test]
    fn complete_csum_tracks_port_changes_independently_of_the_crc() {
        use crate::checksum::fold_checksum;

        let mut p = sample();
        p.set_checksum_mode(ChecksumMode::Complete);
        p.set_complete_csum(0x1234);

        let mut key = FlowKey::default();
        set_sctp(&mut p, &mut key, Some(443), Some(8080)).unwrap();

        let expected = csum_replace2(csum_replace2(0x1234, 0, 443), 0, 8080);
        assert_eq!(fold_checksum(p.complete_csum()), fold_checksum(expected));
    }
}
