//! Packet buffer adaptor (spec §3 `Packet`, §4.1).
//!
//! Grounded on the teacher's `drivers/src/net/packetbuf.rs`: a single owned
//! byte buffer with `head`/`tail` cursors bounding the active region, plus
//! layer offsets recording where each header starts. The teacher's
//! `PacketBuf` is move-only and pool-backed; this crate has no pool (it
//! does not own allocation policy, which spec §1 places out of scope), so
//! `Packet` wraps a plain `Vec<u8>` instead, but keeps the same "re-derive
//! slices after every mutation" discipline (spec §9).
//!
//! A fixed headroom reserve mirrors the teacher's `HEADROOM` constant: it
//! lets `push_mpls`/`push_vlan` grow the frame toward the front without
//! reallocating on the common path.

extern crate alloc;

use alloc::vec::Vec;

use crate::error::ExecError;

/// Reserved headroom for newly constructed packets, mirroring the
/// teacher's `packetbuf::HEADROOM`. Large enough for one VLAN push and one
/// MPLS push without reallocating.
pub const HEADROOM: usize = 32;

/// Width in bytes of one VLAN tag or one MPLS label stack entry — both
/// `TAG_HLEN` in the sense that pushing or popping either shifts the mac
/// header by exactly this many bytes (spec §4.3).
pub const TAG_HLEN: usize = 4;

pub const ETH_HLEN: usize = 14;
pub const ETHERTYPE_8021Q: u16 = 0x8100;
pub const ETHERTYPE_8021AD: u16 = 0x88a8;

/// Checksum regime a packet is carrying, per spec §4.2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChecksumMode {
    /// No checksum information; nothing needs updating.
    None,
    /// Checksum already verified unnecessary (e.g. loopback); nothing to update.
    Unnecessary,
    /// `complete_csum` tracks the checksum over the full packet; every
    /// mutation must apply a matching incremental correction.
    Complete,
    /// The NIC will finish the L4 checksum; pseudo-header fields still need
    /// correcting, but the L4 check field itself is touched unconditionally.
    Partial,
}

/// Hardware-accelerated ("out of band") VLAN tag slot, to be inserted by
/// the NIC on transmit rather than carried inline in the byte stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VlanAccel {
    pub present: bool,
    pub tpid: u16,
    pub tci: u16,
}

/// A packet buffer with layered header offsets and a checksum mode.
///
/// Invariant maintained by every method on this type: `head <= mac_offset`,
/// `mac_offset + mac_len <= transport_offset <= tail <= buf.len()`. Methods
/// that change any of these always update the others so the invariant
/// holds again before returning.
pub struct Packet {
    buf: Vec<u8>,
    head: usize,
    tail: usize,
    mac_offset: usize,
    mac_len: usize,
    transport_offset: usize,
    checksum: ChecksumMode,
    complete_csum: u32,
    inner_protocol: Option<u16>,
    rx_hash: Option<u32>,
    vlan: VlanAccel,
    /// Test-only allocation-failure injector; always present (cheap `bool`)
    /// but only ever set by [`Packet::simulate_oom`], which is `cfg(test)`.
    inject_oom: bool,
}

impl Packet {
    /// Build a packet from raw wire bytes. `mac_len` and `network_len` lay
    /// out the mac/network header spans; the transport header begins right
    /// after. Mirrors the teacher's `set_l2`/`set_l3`/`set_l4`, done once
    /// up front here because this crate does not own header parsing.
    pub fn from_frame(bytes: &[u8], mac_len: usize, network_len: usize, checksum: ChecksumMode) -> Self {
        let mut buf = Vec::with_capacity(HEADROOM + bytes.len());
        buf.resize(HEADROOM, 0);
        buf.extend_from_slice(bytes);
        let head = HEADROOM;
        let tail = HEADROOM + bytes.len();
        Self {
            buf,
            head,
            tail,
            mac_offset: head,
            mac_len,
            transport_offset: head + mac_len + network_len,
            checksum,
            complete_csum: 0,
            inner_protocol: None,
            rx_hash: None,
            vlan: VlanAccel::default(),
            inject_oom: false,
        }
    }

    #[cfg(test)]
    pub fn simulate_oom(&mut self) {
        self.inject_oom = true;
    }

    fn take_fail_next_alloc(&mut self) -> bool {
        if self.inject_oom {
            self.inject_oom = false;
            true
        } else {
            false
        }
    }

    // -- layout -----------------------------------------------------------

    #[inline]
    pub fn head(&self) -> usize {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> usize {
        self.tail
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tail - self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    #[inline]
    pub fn mac_offset(&self) -> usize {
        self.mac_offset
    }

    #[inline]
    pub fn mac_len(&self) -> usize {
        self.mac_len
    }

    #[inline]
    pub fn network_offset(&self) -> usize {
        self.mac_offset + self.mac_len
    }

    #[inline]
    pub fn transport_offset(&self) -> usize {
        self.transport_offset
    }

    #[inline]
    pub fn set_transport_offset(&mut self, offset: usize) {
        self.transport_offset = offset;
    }

    pub fn payload(&self) -> &[u8] {
        &self.buf[self.head..self.tail]
    }

    pub fn mac_header(&self) -> &[u8] {
        &self.buf[self.mac_offset..self.mac_offset + self.mac_len]
    }

    pub fn mac_header_mut(&mut self) -> &mut [u8] {
        let (start, end) = (self.mac_offset, self.mac_offset + self.mac_len);
        &mut self.buf[start..end]
    }

    pub fn network_header(&self) -> &[u8] {
        &self.buf[self.network_offset()..self.transport_offset]
    }

    pub fn network_header_mut(&mut self) -> &mut [u8] {
        let (start, end) = (self.network_offset(), self.transport_offset);
        &mut self.buf[start..end]
    }

    pub fn transport_header(&self) -> &[u8] {
        &self.buf[self.transport_offset..self.tail]
    }

    pub fn transport_header_mut(&mut self) -> &mut [u8] {
        let (start, end) = (self.transport_offset, self.tail);
        &mut self.buf[start..end]
    }

    /// The 16-bit ethertype field: always the final two bytes of the mac
    /// header span, which holds whether or not `mac_len` currently
    /// includes a materialized VLAN tag or MPLS label stack (spec §4.3).
    pub fn ethertype(&self) -> u16 {
        let end = self.mac_offset + self.mac_len;
        u16::from_be_bytes([self.buf[end - 2], self.buf[end - 1]])
    }

    pub fn set_ethertype(&mut self, ethertype: u16) {
        let end = self.mac_offset + self.mac_len;
        let bytes = ethertype.to_be_bytes();
        self.buf[end - 2] = bytes[0];
        self.buf[end - 1] = bytes[1];
    }

    // -- checksum mode ------------------------------------------------------

    #[inline]
    pub fn checksum_mode(&self) -> ChecksumMode {
        self.checksum
    }

    #[inline]
    pub fn set_checksum_mode(&mut self, mode: ChecksumMode) {
        self.checksum = mode;
    }

    #[inline]
    pub fn complete_csum(&self) -> u32 {
        self.complete_csum
    }

    #[inline]
    pub fn set_complete_csum(&mut self, csum: u32) {
        self.complete_csum = csum;
    }

    // -- misc metadata --------------------------------------------------------

    pub fn set_inner_protocol(&mut self, proto: Option<u16>) {
        self.inner_protocol = proto;
    }

    pub fn inner_protocol(&self) -> Option<u16> {
        self.inner_protocol
    }

    /// Clear the packet's cached RX-hash. Every header mutation does this
    /// (spec §4.2 "Any header mutation also clears the packet's RX-hash
    /// cache").
    pub fn hash_clear(&mut self) {
        self.rx_hash = None;
    }

    pub fn rx_hash(&self) -> Option<u32> {
        self.rx_hash
    }

    pub fn set_rx_hash(&mut self, hash: u32) {
        self.rx_hash = Some(hash);
    }

    pub fn vlan_accel(&self) -> VlanAccel {
        self.vlan
    }

    pub fn set_vlan_accel(&mut self, vlan: VlanAccel) {
        self.vlan = vlan;
    }

    // -- growth / shift primitives --------------------------------------------

    /// Ensure `needed` bytes are linearly accessible starting at the mac
    /// header (spec §4.1). All header mutators call this before touching
    /// bytes. Never frees the packet on failure — the caller (the action
    /// executor) owns that decision.
    pub fn ensure_writable(&mut self, needed: usize) -> Result<(), ExecError> {
        if self.take_fail_next_alloc() {
            return Err(ExecError::OutOfMemory);
        }
        let want = self.mac_offset + needed;
        if want > self.tail {
            if want > self.buf.len() {
                self.buf.resize(want, 0);
            }
            self.tail = want;
        }
        Ok(())
    }

    fn ensure_headroom(&mut self, extra: usize) -> Result<(), ExecError> {
        if self.take_fail_next_alloc() {
            return Err(ExecError::OutOfMemory);
        }
        if self.head < extra {
            let deficit = extra - self.head;
            let mut grown = Vec::with_capacity(self.buf.len() + deficit);
            grown.resize(deficit, 0);
            grown.extend_from_slice(&self.buf);
            self.buf = grown;
            self.head += deficit;
            self.tail += deficit;
            self.mac_offset += deficit;
            self.transport_offset += deficit;
        }
        Ok(())
    }

    /// Grow the active region by [`TAG_HLEN`] at the front, relocating the
    /// mac header forward and leaving a `TAG_HLEN`-byte gap right after it
    /// (at [`Packet::mac_gap_offset`]) for the caller to fill in — used by
    /// `push_mpls`/`push_vlan`.
    pub(crate) fn grow_mac_header(&mut self) -> Result<(), ExecError> {
        self.ensure_headroom(TAG_HLEN)?;
        self.head -= TAG_HLEN;
        let old_mac = self.mac_offset;
        self.mac_offset -= TAG_HLEN;
        self.buf.copy_within(old_mac..old_mac + self.mac_len, self.mac_offset);
        Ok(())
    }

    /// Inverse of [`Packet::grow_mac_header`]: removes the `TAG_HLEN`-byte
    /// gap right after the mac header, shifting it forward — used by
    /// `pop_mpls`/`pop_vlan`. Callers must read the gap's contents (via
    /// [`Packet::mac_gap`]) before calling this.
    pub(crate) fn shrink_mac_header(&mut self) {
        let old_mac = self.mac_offset;
        self.mac_offset += TAG_HLEN;
        self.buf.copy_within(old_mac..old_mac + self.mac_len, self.mac_offset);
        self.head += TAG_HLEN;
    }

    #[inline]
    pub(crate) fn mac_gap_offset(&self) -> usize {
        self.mac_offset + self.mac_len
    }

    pub(crate) fn mac_gap(&self) -> u32 {
        let o = self.mac_gap_offset();
        u32::from_be_bytes(self.buf[o..o + TAG_HLEN].try_into().unwrap())
    }

    pub(crate) fn set_mac_gap(&mut self, value: u32) {
        let o = self.mac_gap_offset();
        self.buf[o..o + TAG_HLEN].copy_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn adjust_mac_len(&mut self, delta: i32) {
        if delta >= 0 {
            self.mac_len += delta as usize;
        } else {
            self.mac_len -= (-delta) as usize;
        }
    }

    // -- ownership: clone / free / consume -----------------------------------

    /// Clone this packet. Returns `None` on simulated allocation failure —
    /// callers (sample, output staging) must treat that as "silently skip".
    pub fn try_clone(&mut self) -> Option<Packet> {
        if self.take_fail_next_alloc() {
            return None;
        }
        Some(Packet {
            buf: self.buf.clone(),
            head: self.head,
            tail: self.tail,
            mac_offset: self.mac_offset,
            mac_len: self.mac_len,
            transport_offset: self.transport_offset,
            checksum: self.checksum,
            complete_csum: self.complete_csum,
            inner_protocol: self.inner_protocol,
            rx_hash: self.rx_hash,
            vlan: self.vlan,
            inject_oom: false,
        })
    }

    /// Release the packet without further notification. Functionally the
    /// same as dropping it — spelled out because spec §3 names both
    /// `free()` and `consume()` as distinct lifecycle operations on the
    /// external packet-buffer interface.
    pub fn free(self) {}

    /// Release the packet along the "normal" (not error) path.
    pub fn consume(self) {}
}

#[cfg(test)]
#[path = "packet_tests.rs"]
mod packet_tests;
