//! Small shared utilities: init-once flags and rate-limited logging gates.
//!
//! Grounded on the teacher's `InitFlag`/`PERCPU_INIT` usage pattern
//! (`lib/src/percpu.rs::init_bsp`) and on the `net_ratelimit()` call sites
//! guarding every `pr_warn` in the original OVS action executor.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// One-shot latch: the first caller to observe it unset wins, everyone else
/// gets `false`. Used for module-lifecycle guards like `fifos_init`.
pub struct InitFlag(AtomicBool);

impl InitFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Returns `true` exactly once per lifetime of the flag (until reset).
    pub fn init_once(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_initialized(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for InitFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Trivial counting rate limiter: allows one message, then suppresses the
/// next `burst - 1` calls, then allows again. This is not wall-clock based
/// (no clock source is assumed available in `no_std`); it bounds log volume
/// under a sustained-failure storm, which is the property §7 cares about.
pub struct RateLimiter {
    count: AtomicU32,
    burst: u32,
}

impl RateLimiter {
    pub const fn new(burst: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            burst,
        }
    }

    /// Returns `true` if this call should actually emit a log line.
    pub fn allow(&self) -> bool {
        let prev = self.count.fetch_add(1, Ordering::Relaxed);
        prev % self.burst == 0
    }
}

#[cfg(test)]
mod util_tests {
    use super::*;

    #[test]
    fn init_once_fires_a_single_time() {
        let flag = InitFlag::new();
        assert!(flag.init_once());
        assert!(!flag.init_once());
        assert!(!flag.init_once());
        flag.reset();
        assert!(flag.init_once());
    }

    #[test]
    fn rate_limiter_admits_first_of_every_burst() {
        let rl = RateLimiter::new(3);
        let allowed: alloc::vec::Vec<bool> = (0..7).map(|_| rl.allow()).collect();
        assert_eq!(
            allowed,
            alloc::vec![true, false, false, true, false, false, true]
        );
    }
}
