//! Per-CPU deferred-action queue (spec §3 `ActionFifo`, §4.5).
//!
//! A bounded ring, one per CPU, holding work produced by `sample` and
//! `recirculate` so it can run after the triggering action list finishes
//! (spec §5 "deferred actions ... executed after all non-deferred actions
//! of that call complete"). Grounded on the teacher's per-CPU slot pattern;
//! the ring itself is plain array-backed, matching the original's
//! fixed-size `ovs_dp_process_deferred_actions` buffer rather than a
//! growable collection.

extern crate alloc;

use alloc::vec::Vec;

use crate::actions::ActionList;
use crate::key::FlowKey;
use crate::packet::Packet;
use crate::percpu::PerCpu;

/// Total ring slots. One slot is always kept empty (see [`Ring::is_full`]),
/// so the usable capacity is `FIFO_CAP - 1`.
pub const FIFO_CAP: usize = 10;

/// One unit of deferred work: a packet, the flow key that should be used
/// to process it, and either a nested action list to run directly
/// (`sample`) or `None`, meaning "re-dispatch through flow lookup keyed by
/// `key.recirc_id`" (`recirculate`).
pub struct DeferredAction {
    pub packet: Packet,
    pub key: FlowKey,
    pub actions: Option<ActionList>,
}

struct Ring {
    slots: [Option<DeferredAction>; FIFO_CAP],
    head: usize,
    tail: usize,
}

impl Ring {
    fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            head: 0,
            tail: 0,
        }
    }

    /// Reserve-one policy: the ring is full when advancing `tail` would
    /// make it collide with `head`, so at most `FIFO_CAP - 1` items are
    /// ever live at once (spec §3).
    fn is_full(&self) -> bool {
        (self.tail + 1) % FIFO_CAP == self.head
    }

    fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    fn push(&mut self, item: DeferredAction) -> Result<(), DeferredAction> {
        if self.is_full() {
            return Err(item);
        }
        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % FIFO_CAP;
        Ok(())
    }

    fn pop(&mut self) -> Option<DeferredAction> {
        if self.is_empty() {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % FIFO_CAP;
        item
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

static FIFO: PerCpu<Ring> = PerCpu::new(Ring::new);

/// Enqueue a deferred action on the current CPU's ring. Returns the item
/// back to the caller on overflow so it can be freed (by dropping it) and
/// the overflow logged, without this module owning logging policy.
pub fn push(item: DeferredAction) -> Result<(), DeferredAction> {
    FIFO.with_current(|ring| ring.push(item))
}

/// Pop the next deferred action, in FIFO order.
pub fn pop() -> Option<DeferredAction> {
    FIFO.with_current(|ring| ring.pop())
}

/// Reinitialize the ring after a drain pass (spec §4.5, §8 property 8).
pub fn reset() {
    FIFO.with_current(|ring| ring.reset());
}

#[cfg(test)]
pub fn positions() -> (usize, usize) {
    FIFO.with_current(|ring| (ring.head, ring.tail))
}

#[cfg(test)]
mod fifo_tests {
    use super::*;
    use crate::packet::ChecksumMode;

    fn item() -> DeferredAction {
        DeferredAction {
            packet: Packet::from_frame(&[0u8; 14], 14, 0, ChecksumMode::None),
            key: FlowKey::default(),
            actions: None,
        }
    }

    #[test]
    fn capacity_is_fifo_cap_minus_one() {
        reset();
        let mut rejected = 0usize;
        for _ in 0..FIFO_CAP {
            if push(item()).is_err() {
                rejected += 1;
            }
        }
        assert_eq!(rejected, 1, "exactly one insertion beyond capacity must be rejected");
        reset();
    }

    #[test]
    fn pop_returns_items_in_insertion_order() {
        reset();
        let mut keys = Vec::new();
        for i in 0..3u32 {
            let mut d = item();
            d.key.recirc_id = i;
            push(d).unwrap();
        }
        while let Some(d) = pop() {
            keys.push(d.key.recirc_id);
        }
        assert_eq!(keys, alloc::vec![0, 1, 2]);
        reset();
    }

    #[test]
    fn reset_restores_head_and_tail_to_zero() {
        reset();
        for _ in 0..5 {
            push(item()).unwrap();
        }
        pop();
        pop();
        reset();
        assert_eq!(positions(), (0, 0));
    }
}
