//! Ethernet address mutation (spec §4.3 `set_ethernet`).

use crate::error::ExecError;
use crate::key::{FlowKey, MacAddr};
use crate::packet::Packet;

const DST_RANGE: core::ops::Range<usize> = 0..6;
const SRC_RANGE: core::ops::Range<usize> = 6..12;

/// Overwrite source and/or destination MAC address. Ethernet addresses are
/// not covered by any checksum, so this never touches `complete_csum`.
pub fn set_ethernet(
    packet: &mut Packet,
    key: &mut FlowKey,
    src: Option<MacAddr>,
    dst: Option<MacAddr>,
) -> Result<(), ExecError> {
    packet.ensure_writable(12)?;
    if let Some(src) = src {
        packet.mac_header_mut()[SRC_RANGE].copy_from_slice(&src.0);
        key.eth.src = src;
    }
    if let Some(dst) = dst {
        packet.mac_header_mut()[DST_RANGE].copy_from_slice(&dst.0);
        key.eth.dst = dst;
    }
    packet.hash_clear();
    Ok(())
}
