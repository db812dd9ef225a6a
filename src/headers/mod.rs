//! Header mutators (spec §4.3).
//!
//! One file per protocol, the way the teacher lays out `drivers/src/net/`
//! (`ipv4.rs`, `tcp.rs`, `udp.rs` each own their header's concerns). Every
//! mutator here takes the packet and flow key together and keeps both
//! coherent, following spec §4.2's "packet bytes and flow key travel
//! together" rule.
//!
//! All mutators but [`vlan::push_vlan`] borrow the packet (`&mut Packet`)
//! and return `Result<(), ExecError>` — on error the packet is left
//! exactly as before the call, and the caller (the executor) decides
//! whether to free it. `vlan::push_vlan` is the documented exception: it
//! takes the packet by value and, on the one failure path that happens
//! after a VLAN header has already been materialized into the byte
//! stream, frees it itself and returns `ExecError::AlreadyFreed` so the
//! executor knows not to free it again.

pub mod ethernet;
pub mod ipv4;
pub mod ipv6;
pub mod mpls;
pub mod sctp;
pub mod tcp;
pub mod udp;
pub mod vlan;
