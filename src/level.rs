//! Per-CPU recursion-depth guard (spec §4.6).
//!
//! Grounded on the teacher's per-CPU slot pattern (`percpu::PerCpu`); the
//! counter itself plays the role the original's `OVS_CB(skb)->recirc_level`
//! / per-CPU exec depth does: it bounds how deep a single top-level
//! `execute_actions` call may recurse through nested sample/recirc
//! dispatch before the packet is dropped as a probable loop.

use crate::error::ExecError;
use crate::percpu::PerCpu;

pub const LEVEL_LIMIT: u32 = 4;

static LEVEL: PerCpu<u32> = PerCpu::new(|| 0);

/// Held for the duration of one `execute_actions` call. Decrements the
/// per-CPU level on drop, so every return path (including `?`) unwinds it
/// correctly.
pub struct LevelGuard {
    entry_level: u32,
}

impl LevelGuard {
    /// Whether this call was the outermost one (entered at level 0) — the
    /// only caller allowed to drain the deferred-action FIFO (spec §4.5,
    /// §9 "only the outermost call drains").
    pub fn is_outermost(&self) -> bool {
        self.entry_level == 0
    }
}

impl Drop for LevelGuard {
    fn drop(&mut self) {
        LEVEL.with_current(|level| *level -= 1);
    }
}

/// Enter one level of execution. Returns `Err(ExecError::Loop)` without
/// incrementing anything if the per-CPU level is already at
/// [`LEVEL_LIMIT`].
pub fn enter() -> Result<LevelGuard, ExecError> {
    LEVEL.with_current(|level| {
        if *level >= LEVEL_LIMIT {
            return Err(ExecError::Loop);
        }
        let entry_level = *level;
        *level += 1;
        Ok(LevelGuard { entry_level })
    })
}

/// Test-only: force the per-CPU level back to zero so tests on a shared
/// CPU id don't see state bleed from a previous test.
#[cfg(test)]
pub fn reset_for_test() {
    LEVEL.with_current(|level| *level = 0);
}
