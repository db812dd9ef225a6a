//! TCP port mutation (spec §4.3 `set_tcp`).

use crate::checksum::{csum_replace2, csum_replace2_field};
use crate::error::ExecError;
use crate::key::FlowKey;
use crate::packet::{ChecksumMode, Packet};

pub const TCP_CHECKSUM_OFFSET: usize = 16;

pub fn set_tcp(packet: &mut Packet, key: &mut FlowKey, src: Option<u16>, dst: Option<u16>) -> Result<(), ExecError> {
    packet.ensure_writable(packet.transport_offset() - packet.mac_offset() + TCP_CHECKSUM_OFFSET + 2)?;

    let hdr = packet.transport_header_mut();
    let old_src = u16::from_be_bytes([hdr[0], hdr[1]]);
    let old_dst = u16::from_be_bytes([hdr[2], hdr[3]]);
    let mut csum = u16::from_be_bytes([hdr[TCP_CHECKSUM_OFFSET], hdr[TCP_CHECKSUM_OFFSET + 1]]);

    if let Some(src) = src {
        hdr[0..2].copy_from_slice(&src.to_be_bytes());
        csum = csum_replace2_field(csum, old_src, src);
    }
    if let Some(dst) = dst {
        hdr[2..4].copy_from_slice(&dst.to_be_bytes());
        csum = csum_replace2_field(csum, old_dst, dst);
    }
    hdr[TCP_CHECKSUM_OFFSET..TCP_CHECKSUM_OFFSET + 2].copy_from_slice(&csum.to_be_bytes());

    if packet.checksum_mode() == ChecksumMode::Complete {
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
mod tcp_tests {
    use super::*;
    use crate::packet::ChecksumMode;

    fn sample() -> Packet {
        let mut bytes = alloc::vec![0u8; 14 + 20 + 20];
        bytes[14 + 9] = 6;
        Packet::from_frame(&bytes, 14, 20, ChecksumMode::None)
    }

    #[test]
    fn port_change_updates_key_and_checksum_field() {
        let mut p = sample();
        let mut key = FlowKey::default();
        set_tcp(&mut p, &mut key, Some(443), None).unwrap();
        assert_eq!(key.tp.src, 443);
        let hdr = p.transport_header();
        assert_eq!(u16::from_be_bytes([hdr[0], hdr[1]]), 443);
    }

    #[test]
    fn complete_csum_tracks_port_changes() {
        use crate::checksum::{csum_replace2, fold_checksum};

        let mut p = sample();
        p.set_checksum_mode(ChecksumMode::Complete);
        p.set_complete_csum(0x1234);

        let mut key = FlowKey::default();
        set_tcp(&mut p, &mut key, Some(443), Some(8080)).unwrap();

        let expected = csum_replace2(csum_replace2(0x1234, 0, 443), 0, 8080);
        assert_eq!(fold_checksum(p.complete_csum()), fold_checksum(expected));
    }
}
