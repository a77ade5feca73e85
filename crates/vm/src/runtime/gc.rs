//! Cycle collection: a stop-the-world mark and sweep over the tracker.
//!
//! Reference counting alone cannot reclaim values trapped in cycles. The
//! collector treats every tracked value with more than one reference as a
//! candidate root (a cycle member's in-cycle edge accounts for one
//! reference, so anything above that has an owner outside the cycle), marks
//! everything reachable from the roots, then decrements each unmarked
//! survivor once. Pure cycles drop to zero and are finalized without
//! walking children; the children are swept independently in the same pass.
//!
//! The collector never runs automatically; the interpreter or the host
//! calls it at a quiescent point. Callers whose live values may be held by
//! a single owner (an operand stack slot, a scope binding, a constant pool)
//! must pin those owners through `collect_cycles_with_roots` — the
//! refcount heuristic alone cannot see them.

use std::collections::HashSet;

use crate::runtime::RuntimeInner;
use crate::value::Value;

impl RuntimeInner {
    /// Runs one mark & sweep pass. Returns the number of values reclaimed.
    pub(crate) fn collect_cycles_inner(&mut self, extra_roots: &[Value]) -> usize {
        // Mark: flood fill from candidate roots through container edges.
        let mut work: Vec<u64> = self
            .objects
            .iter()
            .filter(|(_, obj)| obj.refcount > 1)
            .map(|(id, _)| *id)
            .collect();
        work.extend(extra_roots.iter().map(|v| v.id()));

        let mut marked: HashSet<u64> = HashSet::new();
        while let Some(id) = work.pop() {
            if !marked.insert(id) {
                continue;
            }
            if let Some(obj) = self.objects.get(&id) {
                obj.data.child_ids(&mut work);
            }
        }

        // Sweep: decrement each unmarked value once; reaching zero means the
        // value's only references came from inside a dead cycle.
        let candidates: Vec<u64> = self
            .objects
            .keys()
            .filter(|id| !marked.contains(id))
            .copied()
            .collect();

        let mut reclaimed = 0usize;
        let mut freed_bytes = 0usize;
        for id in candidates {
            let freed = match self.objects.get_mut(&id) {
                Some(obj) => {
                    obj.refcount -= 1;
                    obj.refcount == 0
                }
                None => false,
            };
            if freed {
                if let Some(obj) = self.objects.remove(&id) {
                    let bytes = obj.data.heap_bytes();
                    self.allocated_bytes = self.allocated_bytes.saturating_sub(bytes);
                    freed_bytes += bytes;
                    reclaimed += 1;
                    // Finalize: buffers drop here; child references are NOT
                    // released, the sweep visits them on its own.
                }
            }
        }

        if reclaimed > 0 {
            log::debug!("GC: reclaimed {reclaimed} cycle values, freed ~{freed_bytes} bytes");
        }
        reclaimed
    }
}
