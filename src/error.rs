//! Crate-wide error type.
//!
//! Internal code uses `ExecError` exclusively, the same discipline the
//! teacher's networking stack applies to `NetError` (`drivers/src/net/types.rs`):
//! a single enum covering every failure mode, with `Display` for logging.

use core::fmt;

/// Errors produced while executing an action list against a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecError {
    /// A growth or clone allocation failed (non-sleeping allocation context).
    OutOfMemory,
    /// The per-CPU recursion depth limit (`LEVEL_LIMIT`) was reached.
    Loop,
    /// A header mutator could not make sense of the packet's bytes (e.g. an
    /// IPv6 routing-header probe failed).
    MalformedHeader,
    /// The mutator that produced this error has *already* freed the packet
    /// (the documented `push_vlan` exception in spec §4.1). The executor
    /// must not free the packet a second time and must return immediately.
    AlreadyFreed,
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::Loop => write!(f, "packet loop detected"),
            Self::MalformedHeader => write!(f, "malformed header"),
            Self::AlreadyFreed => write!(f, "packet already freed by mutator"),
        }
    }
}
