//! MPLS label stack mutation (spec §4.3 `push_mpls`/`pop_mpls`/`set_mpls`).
//!
//! Grounded on the original action executor's `push_mpls`/`pop_mpls`: the
//! label stack entry (LSE) lives in the gap directly after the mac header,
//! `mac_len` itself is never touched by an MPLS push or pop (only a VLAN
//! materialize grows it — see `headers::vlan`).

use crate::checksum::{csum_add, csum_replace4, csum_sub};
use crate::error::ExecError;
use crate::key::FlowKey;
use crate::packet::{ChecksumMode, Packet, TAG_HLEN};

pub const MPLS_HLEN: usize = TAG_HLEN;

/// Push a new outermost MPLS label. `ethertype` is the new outer
/// ethertype (`0x8847`/`0x8848`); the previous ethertype becomes the
/// packet's inner protocol if none was recorded yet.
pub fn push_mpls(packet: &mut Packet, key: &mut FlowKey, lse: u32, ethertype: u16) -> Result<(), ExecError> {
    let old_ethertype = packet.ethertype();
    packet.ensure_writable(packet.mac_len())?;
    packet.grow_mac_header()?;
    packet.set_mac_gap(lse);
    packet.set_ethertype(ethertype);

    if packet.inner_protocol().is_none() {
        packet.set_inner_protocol(Some(old_ethertype));
    }
    if packet.checksum_mode() == ChecksumMode::Complete {
        let csum = csum_add(packet.complete_csum(), &lse.to_be_bytes());
        packet.set_complete_csum(csum);
    }

    key.mpls.top_lse = lse;
    key.invalidate();
    packet.hash_clear();
    Ok(())
}

/// Pop the outermost MPLS label, restoring `ethertype` as the mac header's
/// ethertype field.
pub fn pop_mpls(packet: &mut Packet, key: &mut FlowKey, ethertype: u16) -> Result<(), ExecError> {
    packet.ensure_writable(packet.mac_len() + TAG_HLEN)?;

    if packet.checksum_mode() == ChecksumMode::Complete {
        let csum = csum_sub(packet.complete_csum(), &packet.mac_gap().to_be_bytes());
        packet.set_complete_csum(csum);
    }

    packet.shrink_mac_header();
    packet.set_ethertype(ethertype);

    key.mpls.top_lse = 0;
    key.invalidate();
    packet.hash_clear();
    Ok(())
}

/// Rewrite the outermost label stack entry in place (no push/pop, no key
/// invalidation — only the LSE bits change).
pub fn set_mpls(packet: &mut Packet, key: &mut FlowKey, lse: u32) -> Result<(), ExecError> {
    packet.ensure_writable(packet.mac_len() + TAG_HLEN)?;

    let old = packet.mac_gap();
    if packet.checksum_mode() == ChecksumMode::Complete {
        let updated = csum_replace4(packet.complete_csum(), old, lse);
        packet.set_complete_csum(updated);
    }
    packet.set_mac_gap(lse);

    key.mpls.top_lse = lse;
    packet.hash_clear();
    Ok(())
}
