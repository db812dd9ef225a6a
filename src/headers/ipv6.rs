//! IPv6 header mutation (spec §4.3 `set_ipv6`).
//!
//! A destination change is special when a routing header is present: the
//! L4 pseudo-header's destination is the *final* hop encoded in the
//! routing header, not the address sitting in the fixed header, so the
//! incremental L4 checksum update for `dst` is skipped in that case (spec
//! §4.2). The header and key are still rewritten either way — only the L4
//! checksum patch is withheld, and only for `dst`; a `src` change always
//! gets its L4 update applied.

use crate::checksum::{csum_replace2, csum_replace4, csum_replace_ipv6, csum_replace_ipv6_field};
use crate::error::ExecError;
use crate::key::{FlowKey, IpKey, Ipv6Addr, Ipv6Key};
use crate::packet::{ChecksumMode, Packet};

pub const IPV6_HDR_LEN: usize = 40;
const IPPROTO_ROUTING: u8 = 43;

#[derive(Clone, Copy, Debug, Default)]
pub struct Ipv6Mutation {
    pub src: Option<Ipv6Addr>,
    pub dst: Option<Ipv6Addr>,
    pub tclass: Option<u8>,
    pub flow_label: Option<u32>,
    pub hop_limit: Option<u8>,
}

fn has_routing_header(hdr: &[u8]) -> bool {
    hdr[6] == IPPROTO_ROUTING
}

pub fn set_ipv6(
    packet: &mut Packet,
    key: &mut FlowKey,
    l4_checksum_offset: Option<usize>,
    change: Ipv6Mutation,
) -> Result<(), ExecError> {
    packet.ensure_writable(packet.mac_len() + IPV6_HDR_LEN)?;

    let routing_header_present = has_routing_header(packet.network_header());

    let (old_src, old_dst, old_word0, new_word0, old_word1, new_word1, old_hoplimit_word, new_hoplimit_word) = {
        let hdr = packet.network_header_mut();
        let mut old_src = [0u8; 16];
        let mut old_dst = [0u8; 16];
        old_src.copy_from_slice(&hdr[8..24]);
        old_dst.copy_from_slice(&hdr[24..40]);
        let old_word0 = u16::from_be_bytes([hdr[0], hdr[1]]);
        let old_word1 = u16::from_be_bytes([hdr[2], hdr[3]]);
        let old_hoplimit_word = u16::from_be_bytes([hdr[6], hdr[7]]);

        if let Some(src) = change.src {
            hdr[8..24].copy_from_slice(&src.0);
        }
        if let Some(dst) = change.dst {
            hdr[24..40].copy_from_slice(&dst.0);
        }
        if let Some(tc) = change.tclass {
            hdr[0] = (hdr[0] & 0xF0) | (tc >> 4);
            hdr[1] = (hdr[1] & 0x0F) | ((tc & 0x0F) << 4);
        }
        if let Some(fl) = change.flow_label {
            hdr[1] = (hdr[1] & 0xF0) | (((fl >> 16) & 0x0F) as u8);
            hdr[2] = (fl >> 8) as u8;
            hdr[3] = fl as u8;
        }
        if let Some(hop) = change.hop_limit {
            hdr[7] = hop;
        }

        let new_word0 = u16::from_be_bytes([hdr[0], hdr[1]]);
        let new_word1 = u16::from_be_bytes([hdr[2], hdr[3]]);
        let new_hoplimit_word = u16::from_be_bytes([hdr[6], hdr[7]]);
        (old_src, old_dst, old_word0, new_word0, old_word1, new_word1, old_hoplimit_word, new_hoplimit_word)
    };

    if packet.checksum_mode() == ChecksumMode::Complete {
        let mut csum = packet.complete_csum();
        if let Some(src) = change.src {
            csum = csum_replace_ipv6(csum, &old_src, &src.0);
        }
        if let Some(dst) = change.dst {
            csum = csum_replace_ipv6(csum, &old_dst, &dst.0);
        }
        if change.tclass.is_some() || change.flow_label.is_some() {
            csum = csum_replace2(csum, old_word0, new_word0);
            csum = csum_replace2(csum, old_word1, new_word1);
        }
        if change.hop_limit.is_some() {
            csum = csum_replace2(csum, old_hoplimit_word, new_hoplimit_word);
        }
        packet.set_complete_csum(csum);
    }

    // A dst change while a routing header is present must skip the L4
    // incremental update: the pseudo-header's destination is the final hop
    // the routing header encodes, not the address sitting in the fixed
    // header field that was just rewritten. A src change always gets its
    // L4 update applied regardless of routing header presence.
    if let Some(offset) = l4_checksum_offset {
        let dst_gets_l4_update = change.dst.is_some() && !routing_header_present;
        if change.src.is_some() || dst_gets_l4_update {
            let l4 = packet.transport_header_mut();
            let mut field = u16::from_be_bytes([l4[offset], l4[offset + 1]]);
            if let Some(src) = change.src {
                field = csum_replace_ipv6_field(field, &old_src, &src.0);
            }
            if dst_gets_l4_update {
                field = csum_replace_ipv6_field(field, &old_dst, &change.dst.unwrap().0);
            }
            let bytes = field.to_be_bytes();
            l4[offset] = bytes[0];
            l4[offset + 1] = bytes[1];
        }
    }

    let mut v6 = match key.ip {
        IpKey::V6(v6) => v6,
        _ => Ipv6Key::default(),
    };
    if let Some(src) = change.src {
        v6.src = src;
    }
    if let Some(dst) = change.dst {
        v6.dst = dst;
    }
    if let Some(tc) = change.tclass {
        v6.tclass = tc;
    }
    if let Some(fl) = change.flow_label {
        v6.label = fl;
    }
    if let Some(hop) = change.hop_limit {
        v6.hlimit = hop;
    }
    key.ip = IpKey::V6(v6);
    packet.hash_clear();
    Ok(())
}

#[cfg(test)]
mod ipv6_tests {
    use super::*;
    use crate::packet::ChecksumMode;

    fn sample(next_header: u8) -> Packet {
        let mut bytes = alloc::vec![0u8; 14 + 40 + 8];
        bytes[12] = 0x86;
        bytes[13] = 0xDD;
        bytes[14] = 0x60; // version 6
        bytes[14 + 6] = next_header;
        Packet::from_frame(&bytes, 14, 40, ChecksumMode::None)
    }

    #[test]
    fn address_change_updates_key() {
        let mut p = sample(17);
        let mut key = FlowKey::default();
        let new_src = Ipv6Addr([1; 16]);
        set_ipv6(&mut p, &mut key, None, Ipv6Mutation { src: Some(new_src), ..Default::default() }).unwrap();
        assert_eq!(&p.network_header()[8..24], &new_src.0);
        match key.ip {
            IpKey::V6(v6) => assert_eq!(v6.src, new_src),
            _ => panic!("expected V6 key"),
        }
    }

    #[test]
    fn dst_change_skips_l4_checksum_patch_when_routing_header_present() {
        let mut p = sample(IPPROTO_ROUTING);
        p.transport_header_mut()[0] = 0x12;
        p.transport_header_mut()[1] = 0x34;
        let before = u16::from_be_bytes([p.transport_header()[0], p.transport_header()[1]]);

        let mut key = FlowKey::default();
        let new_dst = Ipv6Addr([2; 16]);
        set_ipv6(&mut p, &mut key, Some(0), Ipv6Mutation { dst: Some(new_dst), ..Default::default() }).unwrap();

        assert_eq!(&p.network_header()[24..40], &new_dst.0, "the header must still be rewritten");
        match key.ip {
            IpKey::V6(v6) => assert_eq!(v6.dst, new_dst),
            _ => panic!("expected V6 key"),
        }
        let after = u16::from_be_bytes([p.transport_header()[0], p.transport_header()[1]]);
        assert_eq!(before, after, "L4 checksum must be left untouched when a routing header is present");
    }

    #[test]
    fn src_change_always_patches_l4_checksum_even_with_routing_header() {
        let mut p = sample(IPPROTO_ROUTING);
        p.transport_header_mut()[0] = 0x12;
        p.transport_header_mut()[1] = 0x34;
        let before = u16::from_be_bytes([p.transport_header()[0], p.transport_header()[1]]);

        let mut key = FlowKey::default();
        set_ipv6(&mut p, &mut key, Some(0), Ipv6Mutation { src: Some(Ipv6Addr([3; 16])), ..Default::default() })
            .unwrap();

        let after = u16::from_be_bytes([p.transport_header()[0], p.transport_header()[1]]);
        assert_ne!(before, after, "a src change must always get its L4 checksum patch");
    }

    #[test]
    fn hop_limit_change_does_not_require_routing_probe() {
        let mut p = sample(IPPROTO_ROUTING);
        let mut key = FlowKey::default();
        set_ipv6(&mut p, &mut key, None, Ipv6Mutation { hop_limit: Some(1), ..Default::default() }).unwrap();
        assert_eq!(p.network_header()[7], 1);
    }

    #[test]
    fn complete_csum_tracks_address_and_hop_limit_changes() {
        let mut p = sample(17);
        p.set_checksum_mode(ChecksumMode::Complete);
        p.set_complete_csum(crate::checksum::ones_complement_sum(p.network_header()));

        let mut key = FlowKey::default();
        set_ipv6(
            &mut p,
            &mut key,
            None,
            Ipv6Mutation { src: Some(Ipv6Addr([9; 16])), hop_limit: Some(5), ..Default::default() },
        )
        .unwrap();

        let recomputed = crate::checksum::ones_complement_sum(p.network_header());
        assert_eq!(
            crate::checksum::fold_checksum(p.complete_csum()),
            crate::checksum::fold_checksum(recomputed)
        );
    }
}
