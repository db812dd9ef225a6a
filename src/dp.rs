//! External collaborator seams (spec §6).
//!
//! The flow table, port table, upcall channel, and key extractor are
//! consumed, not owned (spec §1). Grounded on the teacher's `NetDevice`
//! trait / `DeviceHandle` split between control-plane lookup and
//! data-plane send (`drivers/src/net/netdev.rs`): `PortTable::lookup`
//! resolves a port id to a handle, `Port::send` performs the actual
//! transmit and takes ownership of the packet.

extern crate alloc;

use alloc::vec::Vec;

use crate::error::ExecError;
use crate::key::FlowKey;
use crate::packet::Packet;

/// A single output port. Sending takes ownership: the port either queues
/// the packet for transmit or frees it, the executor does not care which.
pub trait Port {
    fn send(&self, pkt: Packet) -> Result<(), ExecError>;
}

/// Resolves port identifiers to output ports. `None` for an unknown or
/// down port is not an error — the executor simply drops the packet that
/// would have gone there.
pub trait PortTable {
    fn lookup(&self, port: u32) -> Option<&dyn Port>;
}

/// Reason code and side metadata for a `USERSPACE` upcall, mirroring the
/// original `ovs_dp_upcall_info`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpcallInfo {
    pub cmd: u8,
    pub userdata: Option<Vec<u8>>,
    pub portid: Option<u32>,
    pub egress_tunnel_info: Option<crate::key::TunnelInfo>,
}

/// Hands a packet to userspace. Ownership of the packet is **not**
/// transferred — the original stays with the executor's action loop
/// (spec §4.4 `USERSPACE`).
pub trait Upcall {
    fn upcall(&self, pkt: &Packet, key: &FlowKey, info: &UpcallInfo) -> Result<(), ExecError>;
}

/// Re-extracts every flow-key field from the packet's current bytes.
/// Invoked whenever the executor is about to use a key that a prior
/// mutation invalidated (spec §3 "an invalidated key must be re-extracted
/// before any operation that depends on it").
pub trait KeyExtractor {
    fn key_update(&self, pkt: &Packet, key: &mut FlowKey) -> Result<(), ExecError>;
}

/// Re-enters flow matching for a recirculated (or drain-replayed) packet.
/// This is a one-way hand-off: the callee owns `pkt`/`key` from here.
pub trait FlowReentry {
    fn reenter(&self, pkt: Packet, key: FlowKey);
}

/// The single handle threaded through `execute_actions`, replacing the
/// bare `struct datapath *dp` the original passes around.
///
/// `sample_rng` externalizes the `sample` action's entropy source the same
/// way `percpu::set_cpu_id_provider` externalizes "which core am I on" —
/// this crate has no platform RNG of its own, so the embedder supplies one
/// (spec §4.5 draws "a 32-bit uniform random value"; the draw itself is an
/// external collaborator by the same logic as the CPU id).
pub struct Datapath<'a> {
    pub ports: &'a dyn PortTable,
    pub upcall: &'a dyn Upcall,
    pub keys: &'a dyn KeyExtractor,
    pub reentry: &'a dyn FlowReentry,
    pub sample_rng: fn() -> u32,
}
