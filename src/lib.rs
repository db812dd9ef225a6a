//! `swdp-actions`: the action-execution half of a software switch datapath.
//!
//! This crate owns exactly one job (spec §1): given a decoded flow key, a
//! packet, and an action list, mutate/forward/recirculate/sample the packet
//! the way the original kernel datapath's action executor does. Flow
//! matching, the flow table itself, and the netlink control-plane surface
//! are all out of scope — they reach in through the collaborator traits in
//! [`dp`].
//!
//! Grounded on the teacher's crate layout: a thin `lib.rs` doing module
//! wiring and crate-wide lifecycle (`drivers/src/lib.rs`'s `net_init`/
//! `net_exit` pair), with the real logic living one file per concern.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod actions;
pub mod checksum;
pub mod dp;
pub mod error;
pub mod executor;
pub mod fifo;
pub mod headers;
pub mod key;
pub mod level;
pub mod log;
pub mod packet;
pub mod percpu;
pub mod util;

use util::InitFlag;

static INIT: InitFlag = InitFlag::new();

/// One-time module-wide setup (spec §6 "the embedder is responsible for
/// module lifecycle"). Idempotent: a second call is a no-op. There is
/// nothing to eagerly allocate — per-CPU slots lazily initialize on first
/// use — so this exists mainly as the documented hook embedders are
/// expected to call before the first [`executor::execute_actions`], mirroring
/// the teacher's `net_init` entry point.
pub fn actions_init() {
    INIT.init_once();
}

/// Tear down module-wide state so a later [`actions_init`] can run again
/// (spec §6). Resets the per-CPU FIFO and level counters for the calling
/// CPU only — other CPUs' slots are left alone, the same scope the
/// teacher's `net_exit` cleans up.
pub fn actions_exit() {
    fifo::reset();
    INIT.reset();
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[test]
    fn init_is_idempotent_and_exit_allows_reinit() {
        INIT.reset();

        actions_init();
        assert!(INIT.is_initialized());
        actions_init();
        assert!(INIT.is_initialized());

        actions_exit();
        assert!(!INIT.is_initialized());

        actions_init();
        assert!(INIT.is_initialized());
        INIT.reset();
    }
}
