//! UDP port mutation (spec §4.3 `set_udp`).
//!
//! Grounded on the teacher's `compute_udp_checksum`: UDP checksums are
//! optional (RFC 768). A stored checksum of zero means "not computed" and
//! must stay zero; a real checksum gets the same incremental patch as TCP,
//! with the "computed value of zero is sent as 0xFFFF" substitution
//! applied to the result.

use crate::checksum::{csum_replace2, csum_replace2_field, mangle_zero_checksum};
use crate::error::ExecError;
use crate::key::FlowKey;
use crate::packet::{ChecksumMode, Packet};

pub const UDP_CHECKSUM_OFFSET: usize = 6;

pub fn set_udp(packet: &mut Packet, key: &mut FlowKey, src: Option<u16>, dst: Option<u16>) -> Result<(), ExecError> {
    packet.ensure_writable(packet.transport_offset() - packet.mac_offset() + UDP_CHECKSUM_OFFSET + 2)?;

    let mode = packet.checksum_mode();

    let hdr = packet.transport_header_mut();
    let old_src = u16::from_be_bytes([hdr[0], hdr[1]]);
    let old_dst = u16::from_be_bytes([hdr[2], hdr[3]]);
    let csum_field = u16::from_be_bytes([hdr[UDP_CHECKSUM_OFFSET], hdr[UDP_CHECKSUM_OFFSET + 1]]);

    if csum_field != 0 {
        let mut csum = csum_field;
        if let Some(src) = src {
            csum = csum_replace2_field(csum, old_src, src);
        }
        if let Some(dst) = dst {
            csum = csum_replace2_field(csum, old_dst, dst);
        }
        // The NIC unconditionally finishes the checksum in partial mode, so
        // the mangled-zero substitution (which only applies to a checksum
        // this side fully computed) is skipped there.
        if mode != ChecksumMode::Partial {
            csum = mangle_zero_checksum(csum);
        }
        hdr[UDP_CHECKSUM_OFFSET..UDP_CHECKSUM_OFFSET + 2].copy_from_slice(&csum.to_be_bytes());
    }

    if let Some(src) = src {
        hdr[0..2].copy_from_slice(&src.to_be_bytes());
    }
    if let Some(dst) = dst {
        hdr[2..4].copy_from_slice(&dst.to_be_bytes());
    }

    if mode == ChecksumMode::Complete {
        let mut acc = packet.complete_csum();
        if let Some(src) = src {
            acc = csum_replace2(acc, old_src, src);
        }
        if let Some(dst) = dst {
            acc = csum_replace2(acc, old_dst, dst);
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
mod udp_tests {
    use super::*;
    use crate::packet::ChecksumMode;

    fn sample(checksum: u16) -> Packet {
        let mut bytes = alloc::vec![0u8; 14 + 20 + 8];
        bytes[14 + 9] = 17;
        let mut p = Packet::from_frame(&bytes, 14, 20, ChecksumMode::None);
        let b = checksum.to_be_bytes();
        p.transport_header_mut()[UDP_CHECKSUM_OFFSET] = b[0];
        p.transport_header_mut()[UDP_CHECKSUM_OFFSET + 1] = b[1];
        p
    }

    #[test]
    fn zero_checksum_stays_disabled_after_port_change() {
        let mut p = sample(0);
        let mut key = FlowKey::default();
        set_udp(&mut p, &mut key, Some(9999), None).unwrap();
        let hdr = p.transport_header();
        assert_eq!(
            u16::from_be_bytes([hdr[UDP_CHECKSUM_OFFSET], hdr[UDP_CHECKSUM_OFFSET + 1]]),
            0
        );
    }

    #[test]
    fn nonzero_checksum_never_becomes_the_disabled_sentinel() {
        let mut p = sample(1);
        let mut key = FlowKey::default();
        // pick ports that would fold the incremental update to exactly 0
        set_udp(&mut p, &mut key, Some(0), None).unwrap();
        let hdr = p.transport_header();
        let result = u16::from_be_bytes([hdr[UDP_CHECKSUM_OFFSET], hdr[UDP_CHECKSUM_OFFSET + 1]]);
        assert_ne!(result, 0);
    }

    #[test]
    fn non_partial_mode_mangles_a_computed_zero_to_all_ones() {
        let mut p = sample(1);
        let mut key = FlowKey::default();
        // src 0 -> 1 against a stored checksum of 1 folds the incremental
        // update to exactly zero.
        set_udp(&mut p, &mut key, Some(1), None).unwrap();
        let hdr = p.transport_header();
        let result = u16::from_be_bytes([hdr[UDP_CHECKSUM_OFFSET], hdr[UDP_CHECKSUM_OFFSET + 1]]);
        assert_eq!(result, 0xFFFF);
    }

    #[test]
    fn partial_mode_skips_the_mangled_zero_substitution() {
        let mut p = sample(1);
        p.set_checksum_mode(ChecksumMode::Partial);
        let mut key = FlowKey::default();
        // same port pick as above, which folds to exactly 0
        set_udp(&mut p, &mut key, Some(1), None).unwrap();
        let hdr = p.transport_header();
        let result = u16::from_be_bytes([hdr[UDP_CHECKSUM_OFFSET], hdr[UDP_CHECKSUM_OFFSET + 1]]);
        assert_eq!(result, 0, "partial mode must not substitute the all-ones sentinel");
    }

    #[test]
    fn complete_csum_tracks_port_changes() {
        use crate::checksum::fold_checksum;

        let mut p = sample(0);
        p.set_checksum_mode(ChecksumMode::Complete);
        p.set_complete_csum(0x1234);

        let mut key = FlowKey::default();
        set_udp(&mut p, &mut key, Some(443), Some(8080)).unwrap();

        let expected = csum_replace2(csum_replace2(0x1234, 0, 443), 0, 8080);
        assert_eq!(fold_checksum(p.complete_csum()), fold_checksum(expected));
    }
}
