//! VLAN tag mutation (spec §4.3 `push_vlan`/`pop_vlan`).
//!
//! A VLAN tag can live in one of two places: the hardware-accelerated
//! "out of band" slot (`Packet::vlan_accel`), or materialized inline in
//! the byte stream right after the mac header (same gap MPLS labels use).
//! Pushing a second tag while one is already accelerated first
//! materializes the old one inline, then occupies the accel slot with the
//! new one — grounded on the original's `push_vlan`/`__vlan_put_tag`.

use crate::checksum::{csum_add, csum_sub};
use crate::error::ExecError;
use crate::key::FlowKey;
use crate::packet::{ChecksumMode, Packet, VlanAccel, ETHERTYPE_8021AD, ETHERTYPE_8021Q, TAG_HLEN};

pub const VLAN_HLEN: usize = TAG_HLEN;

fn is_vlan_ethertype(et: u16) -> bool {
    et == ETHERTYPE_8021Q || et == ETHERTYPE_8021AD
}

/// Pop one in-band tag, returning its TCI. Assumes the caller has already
/// confirmed a tag is present.
fn pop_inband_tag(packet: &mut Packet) -> Result<u16, ExecError> {
    packet.ensure_writable(packet.mac_len() + TAG_HLEN)?;
    let gap = packet.mac_gap();
    let tci = (gap >> 16) as u16;
    let inner_ethertype = gap as u16;

    if packet.checksum_mode() == ChecksumMode::Complete {
        let csum = csum_sub(packet.complete_csum(), &gap.to_be_bytes());
        packet.set_complete_csum(csum);
    }

    packet.shrink_mac_header();
    packet.adjust_mac_len(-(TAG_HLEN as i32));
    packet.set_ethertype(inner_ethertype);
    Ok(tci)
}

/// Push a VLAN tag. Takes the packet by value: on the one failure path
/// that can occur *after* an existing accelerated tag has already been
/// materialized into the byte stream, this frees the packet itself and
/// returns `ExecError::AlreadyFreed` rather than handing back a
/// half-mutated packet for the caller to free (spec §4.1).
pub fn push_vlan(mut packet: Packet, key: &mut FlowKey, tpid: u16, tci: u16) -> Result<Packet, ExecError> {
    if packet.vlan_accel().present {
        let accel = packet.vlan_accel();
        let old_ethertype = packet.ethertype();

        if packet.ensure_writable(packet.mac_len() + TAG_HLEN).is_err() {
            packet.free();
            return Err(ExecError::AlreadyFreed);
        }
        if packet.grow_mac_header().is_err() {
            packet.free();
            return Err(ExecError::AlreadyFreed);
        }

        packet.set_mac_gap(((accel.tci as u32) << 16) | old_ethertype as u32);
        packet.set_ethertype(accel.tpid);
        packet.adjust_mac_len(TAG_HLEN as i32);

        if packet.checksum_mode() == ChecksumMode::Complete {
            let csum = csum_add(packet.complete_csum(), &packet.mac_gap().to_be_bytes());
            packet.set_complete_csum(csum);
        }
        key.invalidate();
    } else {
        key.eth.tci = tci;
    }

    packet.set_vlan_accel(VlanAccel {
        present: true,
        tpid,
        tci,
    });
    packet.hash_clear();
    Ok(packet)
}

/// Pop the outermost VLAN tag, whether accelerated or in-band. If popping
/// the accelerated tag reveals a second, in-band tag underneath, that one
/// is promoted into the (now-empty) accel slot — mirrors the QinQ case in
/// the original `pop_vlan`.
pub fn pop_vlan(packet: &mut Packet, key: &mut FlowKey) -> Result<(), ExecError> {
    if packet.vlan_accel().present {
        let mut accel = packet.vlan_accel();
        accel.present = false;
        accel.tci = 0;
        packet.set_vlan_accel(accel);
    } else {
        if !is_vlan_ethertype(packet.ethertype()) || packet.len() < packet.mac_len() + TAG_HLEN {
            return Ok(());
        }
        pop_inband_tag(packet)?;
    }

    if !is_vlan_ethertype(packet.ethertype()) || packet.len() < packet.mac_len() + TAG_HLEN {
        key.eth.tci = 0;
        packet.hash_clear();
        return Ok(());
    }

    key.invalidate();
    let tci = pop_inband_tag(packet)?;
    packet.set_vlan_accel(VlanAccel {
        present: true,
        tpid: ETHERTYPE_8021Q,
        tci,
    });
    packet.hash_clear();
    Ok(())
}
