//! Flow key model (spec §3 `FlowKey`).
//!
//! The flow key is the executor's "what do the headers currently say"
//! shadow copy, kept coherent with the packet's bytes by every mutator.
//! Grounded on the teacher's `drivers/src/net/types.rs` for the address
//! newtypes (`Ipv4Addr`, `MacAddr`) and their `Display` conventions.

use core::fmt;

/// Ethernet source/destination pair, newtype-wrapped the way the teacher
/// wraps `Ipv4Addr([u8; 4])`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const ZERO: MacAddr = MacAddr([0; 6]);
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Ipv4Addr(pub [u8; 4]);

impl Ipv4Addr {
    pub const UNSPECIFIED: Ipv4Addr = Ipv4Addr([0; 4]);

    pub fn from_u32_be(v: u32) -> Self {
        Self(v.to_be_bytes())
    }

    pub fn to_u32_be(self) -> u32 {
        u32::from_be_bytes(self.0)
    }
}

impl fmt::Display for Ipv4Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(f, "{}.{}.{}.{}", b[0], b[1], b[2], b[3])
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Ipv6Addr(pub [u8; 16]);

impl Ipv6Addr {
    pub const UNSPECIFIED: Ipv6Addr = Ipv6Addr([0; 16]);
}

/// Ethernet-layer key fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EthKey {
    pub src: MacAddr,
    pub dst: MacAddr,
    /// Current outer ethertype. Zeroed by [`FlowKey::invalidate`]; a
    /// zero value is exactly the "this key no longer describes the
    /// packet" sentinel (spec §4.4, grounded on the original's
    /// `invalidate_flow_key` zeroing `key->eth.type`).
    pub ethertype: u16,
    /// Hardware-accelerated VLAN tag control information, if any.
    pub tci: u16,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Ipv4Key {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub proto: u8,
    pub tos: u8,
    pub ttl: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Ipv6Key {
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
    pub proto: u8,
    pub tclass: u8,
    pub hlimit: u8,
    pub label: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IpKey {
    #[default]
    None,
    V4(Ipv4Key),
    V6(Ipv6Key),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MplsKey {
    pub top_lse: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TpKey {
    pub src: u16,
    pub dst: u16,
    /// TCP flags, meaningless for UDP/SCTP.
    pub flags: u16,
}

/// Physical/tunnel metadata, carried through recirculation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhyKey {
    pub in_port: u32,
    pub skb_mark: u32,
}

/// Egress tunnel metadata attached by an upcall or a prior recirculation
/// pass. Encap/decap itself is out of scope; this crate only carries the
/// attachment through the key the way the original threads `egress_tun_info`
/// without interpreting it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TunnelInfo {
    pub tun_id: u64,
    pub ipv4_src: Ipv4Addr,
    pub ipv4_dst: Ipv4Addr,
    pub tun_flags: u16,
}

/// The executor's shadow view of "what do the packet's headers currently
/// say". Updated in lockstep by every header mutator; invalidated (and
/// later re-extracted) across a recirculation (spec §4.4, §4.5).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlowKey {
    pub eth: EthKey,
    pub ip: IpKey,
    pub mpls: MplsKey,
    pub tp: TpKey,
    pub phy: PhyKey,
    pub recirc_id: u32,
    pub ovs_flow_hash: u32,
    pub egress_tunnel_info: Option<TunnelInfo>,
}

impl FlowKey {
    /// Mark the key as no longer describing the packet's current bytes.
    /// Grounded on the original's `invalidate_flow_key`: only the
    /// ethertype field is zeroed, since that's the field `is_valid`
    /// checks.
    pub fn invalidate(&mut self) {
        self.eth.ethertype = 0;
    }

    pub fn is_valid(&self) -> bool {
        self.eth.ethertype != 0
    }
}
