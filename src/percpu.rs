//! Per-CPU state infrastructure.
//!
//! Grounded on the teacher's `lib/src/percpu.rs`: an array of per-core slots
//! indexed by a CPU id, with the owning core being the only reader/writer
//! during normal operation (spec §5, §9 "Per-CPU state"). Unlike the
//! teacher, which derives the CPU id from the local APIC via GS-base
//! addressing, this crate has no fixed notion of "the current core" — the
//! embedding application registers a provider function, the same pattern
//! the teacher uses for `register_lapic_id_fn`.

extern crate alloc;

use alloc::vec::Vec;
use core::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use spin::{Mutex, Once};

/// Maximum number of CPUs supported, matching the teacher's
/// `lib::percpu::MAX_CPUS`.
pub const MAX_CPUS: usize = 256;

type CpuIdFn = fn() -> usize;

fn default_cpu_id() -> usize {
    0
}

static CPU_ID_FN: AtomicPtr<()> = AtomicPtr::new(default_cpu_id as *mut ());
static CPU_ID_OVERRIDE: AtomicUsize = AtomicUsize::new(usize::MAX);

/// Register the function used to determine "the current CPU" for every
/// per-CPU structure in this crate. Call once during embedder init.
pub fn set_cpu_id_provider(f: CpuIdFn) {
    CPU_ID_FN.store(f as *mut (), Ordering::Release);
}

/// Test-only override: pin `current_cpu_id()` to a fixed value regardless
/// of the registered provider, so tests can simulate multiple cores from a
/// single host thread without real SMP.
#[cfg(test)]
pub fn set_cpu_id_override(id: Option<usize>) {
    CPU_ID_OVERRIDE.store(id.unwrap_or(usize::MAX), Ordering::Relaxed);
}

/// Current logical CPU index, clamped to `[0, MAX_CPUS)`.
pub fn current_cpu_id() -> usize {
    let overridden = CPU_ID_OVERRIDE.load(Ordering::Relaxed);
    if overridden != usize::MAX {
        return overridden.min(MAX_CPUS - 1);
    }
    let ptr = CPU_ID_FN.load(Ordering::Acquire);
    // SAFETY: only `set_cpu_id_provider` stores into `CPU_ID_FN`, always
    // with a valid `CpuIdFn`.
    let f: CpuIdFn = unsafe { core::mem::transmute(ptr) };
    f().min(MAX_CPUS - 1)
}

/// One lazily-initialized, lock-protected slot per logical CPU.
///
/// `T` must be constructible from a zero-argument function (mirrors the
/// teacher's `const fn new()` per-CPU constructors).
pub struct PerCpu<T> {
    slots: Once<Vec<Mutex<T>>>,
    make: fn() -> T,
}

impl<T> PerCpu<T> {
    pub const fn new(make: fn() -> T) -> Self {
        Self {
            slots: Once::new(),
            make,
        }
    }

    fn slots(&self) -> &Vec<Mutex<T>> {
        self.slots
            .call_once(|| (0..MAX_CPUS).map(|_| Mutex::new((self.make)())).collect())
    }

    /// Run `f` with exclusive access to the current CPU's slot.
    pub fn with_current<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let idx = current_cpu_id();
        let slots = self.slots();
        let mut guard = slots[idx].lock();
        f(&mut guard)
    }
}

#[cfg(test)]
mod percpu_tests {
    use super::*;

    static COUNTER: PerCpu<u32> = PerCpu::new(|| 0);

    #[test]
    fn slots_are_independent_per_cpu() {
        set_cpu_id_override(Some(1));
        COUNTER.with_current(|v| *v += 1);
        set_cpu_id_override(Some(2));
        COUNTER.with_current(|v| *v += 5);

        set_cpu_id_override(Some(1));
        let v1 = COUNTER.with_current(|v| *v);
        set_cpu_id_override(Some(2));
        let v2 = COUNTER.with_current(|v| *v);

        assert_eq!(v1, 1);
        assert_eq!(v2, 5);
        set_cpu_id_override(None);
    }

    #[test]
    fn default_provider_is_cpu_zero() {
        set_cpu_id_override(None);
        assert_eq!(current_cpu_id(), 0);
    }
}
