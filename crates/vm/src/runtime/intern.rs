//! String interning for the Kronos runtime.
//!
//! A fixed-size open-addressed table with linear probing, sized for typical
//! programs. Interned strings carry one extra reference owned by the table;
//! lookups return a handle already retained for the caller, so `intern` has
//! the same ownership contract as `new_string`.

use crate::runtime::object::{fnv1a, ObjectData};
use crate::runtime::RuntimeInner;
use crate::value::Value;

/// Number of slots in the intern table.
pub(crate) const INTERN_TABLE_SLOTS: usize = 1024;

/// The intern table: a flat array of optional string handles.
pub(crate) struct InternTable {
    slots: Vec<Option<Value>>,
}

impl InternTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: vec![None; INTERN_TABLE_SLOTS],
        }
    }

    pub(crate) fn slot(&self, idx: usize) -> Option<Value> {
        self.slots[idx]
    }

    pub(crate) fn set_slot(&mut self, idx: usize, v: Value) {
        self.slots[idx] = Some(v);
    }

    pub(crate) fn take_slot(&mut self, idx: usize) -> Option<Value> {
        self.slots[idx].take()
    }
}

impl RuntimeInner {
    /// Interns a byte string.
    ///
    /// On a hit the existing handle is retained and returned. On a miss a
    /// fresh string is inserted with two references: one owned by the table
    /// and one returned to the caller. When the table is full the string is
    /// allocated non-interned with a warning.
    pub(crate) fn intern_inner(&mut self, bytes: &[u8]) -> Value {
        let hash = fnv1a(bytes);
        let start = hash as usize % INTERN_TABLE_SLOTS;

        for i in 0..INTERN_TABLE_SLOTS {
            let idx = (start + i) % INTERN_TABLE_SLOTS;
            match self.interner.slot(idx) {
                None => {
                    let v = self.alloc(ObjectData::Str {
                        bytes: bytes.to_vec(),
                        hash,
                    });
                    // One reference for the table on top of the caller's.
                    self.retain_inner(v);
                    self.interner.set_slot(idx, v);
                    return v;
                }
                Some(existing) => {
                    let matches = match self.objects.get(&existing.id()) {
                        Some(obj) => match &obj.data {
                            ObjectData::Str {
                                bytes: stored,
                                hash: stored_hash,
                            } => *stored_hash == hash && stored.len() == bytes.len() && stored == bytes,
                            _ => false,
                        },
                        None => false,
                    };
                    if matches {
                        self.retain_inner(existing);
                        return existing;
                    }
                }
            }
        }

        log::warn!("intern table full; returning a non-interned string");
        self.alloc(ObjectData::Str {
            bytes: bytes.to_vec(),
            hash,
        })
    }

    /// Releases the intern table's references at teardown.
    ///
    /// Entries whose refcount is still above the table's own reference have
    /// outstanding external handles; those are warned about and left for
    /// their owners.
    pub(crate) fn clear_intern_table(&mut self) {
        let mut outstanding = 0usize;
        for idx in 0..INTERN_TABLE_SLOTS {
            if let Some(v) = self.interner.take_slot(idx) {
                if let Some(obj) = self.objects.get(&v.id()) {
                    if obj.refcount > 1 {
                        outstanding += 1;
                    }
                }
                self.release_inner(v);
            }
        }
        if outstanding > 0 {
            log::warn!("{outstanding} interned strings still externally referenced at runtime teardown");
        }
    }
}
