//! Equality, truthiness and hashing over heap values.

use std::collections::HashSet;

use crate::runtime::object::{knuth_hash, ObjectData};
use crate::runtime::RuntimeInner;
use crate::value::Value;

/// Absolute epsilon for number equality.
pub(crate) const NUMBER_EPSILON: f64 = 1e-9;

/// Recursion cap shared by equality, hashing and printing.
pub(crate) const MAX_RECURSION_DEPTH: usize = 64;

/// Fixed hash for nil values.
const NIL_HASH: u32 = 0x9e37_79b9;

fn numbers_equal(a: f64, b: f64) -> bool {
    // NaN compares unequal to itself.
    (a - b).abs() <= NUMBER_EPSILON
}

impl RuntimeInner {
    /// Structural equality between two values.
    ///
    /// Handle-equal values are equal without inspection. Pairs currently
    /// being compared are tracked so that reference cycles compare equal
    /// instead of recursing forever; depth beyond the cap is treated the
    /// same way.
    pub(crate) fn values_equal_inner(&self, a: Value, b: Value) -> bool {
        let mut visited = HashSet::new();
        self.equal_rec(a, b, &mut visited, 0)
    }

    fn equal_rec(
        &self,
        a: Value,
        b: Value,
        visited: &mut HashSet<(u64, u64)>,
        depth: usize,
    ) -> bool {
        if a.id() == b.id() {
            return true;
        }
        if depth >= MAX_RECURSION_DEPTH {
            return true;
        }
        if visited.contains(&(a.id(), b.id())) || visited.contains(&(b.id(), a.id())) {
            return true;
        }

        let (obj_a, obj_b) = match (self.objects.get(&a.id()), self.objects.get(&b.id())) {
            (Some(x), Some(y)) => (x, y),
            _ => return false,
        };

        visited.insert((a.id(), b.id()));

        let result = match (&obj_a.data, &obj_b.data) {
            (ObjectData::Number(x), ObjectData::Number(y)) => numbers_equal(*x, *y),
            (ObjectData::Bool(x), ObjectData::Bool(y)) => x == y,
            (ObjectData::Nil, ObjectData::Nil) => true,
            (
                ObjectData::Str {
                    bytes: x, hash: hx, ..
                },
                ObjectData::Str {
                    bytes: y, hash: hy, ..
                },
            ) => hx == hy && x == y,
            (ObjectData::List(xs), ObjectData::List(ys)) => {
                self.sequences_equal(xs, ys, visited, depth)
            }
            (ObjectData::Tuple(xs), ObjectData::Tuple(ys)) => {
                self.sequences_equal(xs, ys, visited, depth)
            }
            (
                ObjectData::Range {
                    start: s1,
                    end: e1,
                    step: p1,
                },
                ObjectData::Range {
                    start: s2,
                    end: e2,
                    step: p2,
                },
            ) => numbers_equal(*s1, *s2) && numbers_equal(*e1, *e2) && numbers_equal(*p1, *p2),
            (ObjectData::Map(xm), ObjectData::Map(ym)) => {
                // Order-insensitive: every live key of A must be present in
                // B with an equal value, and the live counts must agree.
                if xm.len() != ym.len() {
                    false
                } else {
                    xm.entries().iter().all(|(xk, xv)| {
                        ym.entries().iter().any(|(yk, yv)| {
                            self.equal_rec(*xk, *yk, visited, depth + 1)
                                && self.equal_rec(*xv, *yv, visited, depth + 1)
                        })
                    })
                }
            }
            // Functions and channels have identity semantics; handle
            // equality was already ruled out above.
            _ => false,
        };

        visited.remove(&(a.id(), b.id()));
        result
    }

    fn sequences_equal(
        &self,
        xs: &[Value],
        ys: &[Value],
        visited: &mut HashSet<(u64, u64)>,
        depth: usize,
    ) -> bool {
        xs.len() == ys.len()
            && xs
                .iter()
                .zip(ys.iter())
                .all(|(x, y)| self.equal_rec(*x, *y, visited, depth + 1))
    }

    /// Truthiness: nil is false, bools are themselves, numbers are non-zero,
    /// strings are non-empty, everything else is true.
    pub(crate) fn is_truthy_inner(&self, v: Value) -> Option<bool> {
        let obj = self.objects.get(&v.id())?;
        Some(match &obj.data {
            ObjectData::Nil => false,
            ObjectData::Bool(b) => *b,
            ObjectData::Number(n) => *n != 0.0,
            ObjectData::Str { bytes, .. } => !bytes.is_empty(),
            _ => true,
        })
    }

    /// Content hash used by map keys.
    ///
    /// Strings reuse their precomputed FNV-1a hash; numbers hash the IEEE
    /// bit pattern; containers hash recursively (order-independent for
    /// maps); functions and channels hash their identity through a Knuth
    /// multiplicative hash.
    pub(crate) fn hash_inner(&self, v: Value, depth: usize) -> u32 {
        if depth >= MAX_RECURSION_DEPTH {
            return 0;
        }
        let Some(obj) = self.objects.get(&v.id()) else {
            return 0;
        };
        match &obj.data {
            ObjectData::Number(n) => {
                // Normalize -0.0 so the two zero encodings collide.
                let bits = if *n == 0.0 { 0u64 } else { n.to_bits() };
                knuth_hash((bits ^ (bits >> 32)) as u32)
            }
            ObjectData::Str { hash, .. } => *hash,
            ObjectData::Bool(b) => u32::from(*b),
            ObjectData::Nil => NIL_HASH,
            ObjectData::List(items) => self.hash_sequence(items, depth),
            ObjectData::Tuple(items) => self.hash_sequence(items, depth),
            ObjectData::Range { start, end, step } => {
                let mut h = knuth_hash(fold_bits(*start));
                h = h.wrapping_mul(31).wrapping_add(knuth_hash(fold_bits(*end)));
                h.wrapping_mul(31).wrapping_add(knuth_hash(fold_bits(*step)))
            }
            ObjectData::Map(table) => {
                // Order-independent combination.
                table
                    .entries()
                    .iter()
                    .fold(0u32, |acc, (k, val)| {
                        let pair = self
                            .hash_inner(*k, depth + 1)
                            .wrapping_mul(31)
                            .wrapping_add(self.hash_inner(*val, depth + 1));
                        acc.wrapping_add(pair)
                    })
            }
            ObjectData::Function { .. } | ObjectData::Channel(_) => {
                let id = v.id();
                knuth_hash((id ^ (id >> 32)) as u32)
            }
        }
    }

    fn hash_sequence(&self, items: &[Value], depth: usize) -> u32 {
        let mut h: u32 = 0x811c_9dc5;
        for item in items {
            h = (h ^ self.hash_inner(*item, depth + 1)).wrapping_mul(0x0100_0193);
        }
        h
    }
}

fn fold_bits(n: f64) -> u32 {
    let bits = if n == 0.0 { 0u64 } else { n.to_bits() };
    (bits ^ (bits >> 32)) as u32
}
