//! The Kronos runtime: heap, reference counting, interning and statistics.
//!
//! A [`Runtime`] is a clonable handle to shared state behind a single
//! mutex: the tracker table owning every live heap object, the string
//! intern table, and the allocation statistics. Compilers and interpreters
//! thread a handle through; there is no process-global state.
//!
//! ## Ownership contract
//!
//! Every owner of a value — operand stack slot, scope binding, container
//! element, constant pool entry, intern table entry — accounts for exactly
//! one reference. Factories return handles with refcount 1 (the caller's
//! reference). Runtime methods that hand a child value back to the caller
//! (`list_get`, `map_get`, `iter_next`, …) retain it on the caller's
//! behalf under the same lock.
//!
//! ## Threading
//!
//! Handles are `Clone + Send + Sync`; all mutation goes through the mutex,
//! which also makes the per-value refcounts effectively atomic. Each
//! interpreter is single-threaded over one bytecode; separate interpreters
//! in separate threads may share one runtime.

mod compare;
mod display;
mod gc;
mod intern;
mod map_table;
mod object;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{VmError, VmResult};
use crate::value::{Value, ValueType};

use intern::InternTable;
use map_table::{InsertOutcome, MapTable};
use object::{fnv1a, HeapObject, ObjectData};

/// Shared runtime state: tracker, intern table, statistics.
pub(crate) struct RuntimeInner {
    /// Every live heap object, keyed by handle id. This is the GC tracker:
    /// a value is tracked exactly once for its whole lifetime.
    objects: HashMap<u64, HeapObject>,

    /// Monotone id counter; 0 is never issued.
    next_id: u64,

    /// Running size estimate of all tracked objects.
    allocated_bytes: usize,

    /// String intern table.
    interner: InternTable,
}

impl RuntimeInner {
    fn new() -> Self {
        Self {
            objects: HashMap::new(),
            next_id: 1,
            allocated_bytes: 0,
            interner: InternTable::new(),
        }
    }

    /// Allocates and tracks a fresh object with refcount 1.
    ///
    /// The monotone id counter makes duplicate tracking impossible by
    /// construction; the debug assertion documents the invariant.
    pub(crate) fn alloc(&mut self, data: ObjectData) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        self.allocated_bytes += data.heap_bytes();
        let previous = self.objects.insert(id, HeapObject::new(data));
        debug_assert!(previous.is_none(), "duplicate track of value #{id}");
        Value(id)
    }

    pub(crate) fn obj(&self, v: Value) -> VmResult<&HeapObject> {
        self.objects
            .get(&v.id())
            .ok_or(VmError::DanglingHandle { id: v.id() })
    }

    pub(crate) fn obj_mut(&mut self, v: Value) -> VmResult<&mut HeapObject> {
        self.objects
            .get_mut(&v.id())
            .ok_or(VmError::DanglingHandle { id: v.id() })
    }

    /// Increments a refcount. Saturates at `u32::MAX` with a warning
    /// rather than wrapping or aborting.
    pub(crate) fn retain_inner(&mut self, v: Value) {
        match self.objects.get_mut(&v.id()) {
            None => log::warn!("retain of untracked value #{}", v.id()),
            Some(obj) => {
                if obj.refcount == u32::MAX {
                    log::warn!("refcount saturated on value #{}", v.id());
                } else {
                    obj.refcount += 1;
                }
            }
        }
    }

    /// Decrements a refcount; at zero the value is untracked, its buffers
    /// are freed, and its children are released.
    ///
    /// The walk is iterative — an explicit work stack instead of native
    /// recursion — so pathologically nested containers cannot overflow the
    /// call stack.
    pub(crate) fn release_inner(&mut self, v: Value) {
        let mut work = vec![v.id()];
        while let Some(id) = work.pop() {
            match self.objects.get_mut(&id) {
                None => log::warn!("release of untracked value #{id}"),
                Some(obj) => {
                    if obj.refcount == 0 {
                        // Internal invariant violation; logged, execution
                        // continues but is suspect.
                        log::warn!("refcount underflow on value #{id}");
                        continue;
                    }
                    obj.refcount -= 1;
                    if obj.refcount == 0 {
                        if let Some(obj) = self.objects.remove(&id) {
                            self.allocated_bytes = self
                                .allocated_bytes
                                .saturating_sub(obj.data.heap_bytes());
                            obj.data.child_ids(&mut work);
                        }
                    }
                }
            }
        }
    }

    /// Detaches a map's table so it can be mutated while key hashing and
    /// equality read the rest of the heap.
    fn take_map(&mut self, m: Value) -> VmResult<MapTable> {
        let obj = self.obj_mut(m)?;
        match &mut obj.data {
            ObjectData::Map(table) => Ok(std::mem::replace(table, MapTable::detached())),
            other => Err(VmError::type_mismatch("map", other.value_type().name())),
        }
    }

    fn put_map(&mut self, m: Value, table: MapTable) {
        if let Ok(obj) = self.obj_mut(m) {
            if let ObjectData::Map(slot) = &mut obj.data {
                *slot = table;
            }
        }
    }
}

impl Drop for RuntimeInner {
    fn drop(&mut self) {
        // Teardown order per the runtime contract: the intern table first
        // (with a warning for entries still externally referenced), then
        // whatever is left in the tracker is logged and freed wholesale.
        self.clear_intern_table();
        if !self.objects.is_empty() {
            log::debug!(
                "runtime teardown: {} values still tracked ({} bytes)",
                self.objects.len(),
                self.allocated_bytes
            );
        }
    }
}

/// A clonable handle to the shared Kronos runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<Mutex<RuntimeInner>>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Creates a fresh runtime with an empty heap and intern table.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RuntimeInner::new())),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RuntimeInner> {
        self.inner.lock().expect("Lock poisoned")
    }

    // ---- Factories -------------------------------------------------------
    //
    // Every factory returns a fresh handle with refcount 1, tracked exactly
    // once.

    /// Allocates a number value.
    pub fn new_number(&self, n: f64) -> Value {
        self.lock().alloc(ObjectData::Number(n))
    }

    /// Allocates a string value, copying the bytes and precomputing the
    /// FNV-1a hash.
    pub fn new_string(&self, bytes: &[u8]) -> Value {
        let hash = fnv1a(bytes);
        self.lock().alloc(ObjectData::Str {
            bytes: bytes.to_vec(),
            hash,
        })
    }

    /// Allocates a boolean value.
    pub fn new_bool(&self, b: bool) -> Value {
        self.lock().alloc(ObjectData::Bool(b))
    }

    /// Allocates a nil value.
    pub fn new_nil(&self) -> Value {
        self.lock().alloc(ObjectData::Nil)
    }

    /// Allocates an empty list. A zero capacity request gets the default
    /// initial capacity of 4.
    pub fn new_list(&self, capacity: usize) -> Value {
        let capacity = if capacity == 0 { 4 } else { capacity };
        self.lock()
            .alloc(ObjectData::List(Vec::with_capacity(capacity)))
    }

    /// Allocates an empty map.
    pub fn new_map(&self, capacity: usize) -> Value {
        self.lock().alloc(ObjectData::Map(MapTable::new(capacity)))
    }

    /// Allocates a tuple, retaining each input value.
    pub fn new_tuple(&self, items: &[Value]) -> VmResult<Value> {
        let mut inner = self.lock();
        for item in items {
            inner.obj(*item)?;
        }
        for item in items {
            inner.retain_inner(*item);
        }
        Ok(inner.alloc(ObjectData::Tuple(items.to_vec().into_boxed_slice())))
    }

    /// Allocates a range. A zero step is coerced to 1 with a warning;
    /// negative steps produce reverse iteration.
    pub fn new_range(&self, start: f64, end: f64, step: f64) -> Value {
        let step = if step == 0.0 {
            log::warn!("range step of 0 coerced to 1");
            1.0
        } else {
            step
        };
        self.lock().alloc(ObjectData::Range { start, end, step })
    }

    /// Allocates a function value, copying the compiled body and retaining
    /// the parameter-name values.
    pub fn new_function(&self, code: &[u8], arity: u8, params: &[Value]) -> VmResult<Value> {
        let mut inner = self.lock();
        for param in params {
            inner.obj(*param)?;
        }
        for param in params {
            inner.retain_inner(*param);
        }
        Ok(inner.alloc(ObjectData::Function {
            code: code.to_vec(),
            arity,
            params: params.to_vec(),
        }))
    }

    /// Allocates a channel wrapper around an opaque host handle.
    pub fn new_channel(&self, handle: u64) -> Value {
        self.lock().alloc(ObjectData::Channel(handle))
    }

    /// Interns a byte string; byte-equal inputs share one heap value as
    /// long as the table has room. The returned handle is retained for the
    /// caller, exactly like `new_string`.
    pub fn intern(&self, bytes: &[u8]) -> Value {
        self.lock().intern_inner(bytes)
    }

    /// Convenience for interning UTF-8 text.
    pub fn intern_str(&self, s: &str) -> Value {
        self.intern(s.as_bytes())
    }

    // ---- Reference counting ---------------------------------------------

    /// Adds one reference to a value.
    pub fn retain(&self, v: Value) {
        self.lock().retain_inner(v);
    }

    /// Removes one reference; the value is destroyed at zero.
    pub fn release(&self, v: Value) {
        self.lock().release_inner(v);
    }

    /// Returns the current refcount, mainly for tests and diagnostics.
    pub fn refcount(&self, v: Value) -> VmResult<u32> {
        Ok(self.lock().obj(v)?.refcount)
    }

    /// Returns `true` while the handle refers to a live object.
    pub fn is_live(&self, v: Value) -> bool {
        self.lock().objects.contains_key(&v.id())
    }

    // ---- Inspection ------------------------------------------------------

    /// The runtime type of a value.
    pub fn type_of(&self, v: Value) -> VmResult<ValueType> {
        Ok(self.lock().obj(v)?.data.value_type())
    }

    /// Reads a number.
    pub fn number(&self, v: Value) -> VmResult<f64> {
        let inner = self.lock();
        match &inner.obj(v)?.data {
            ObjectData::Number(n) => Ok(*n),
            other => Err(VmError::type_mismatch("number", other.value_type().name())),
        }
    }

    /// Reads a boolean.
    pub fn boolean(&self, v: Value) -> VmResult<bool> {
        let inner = self.lock();
        match &inner.obj(v)?.data {
            ObjectData::Bool(b) => Ok(*b),
            other => Err(VmError::type_mismatch("bool", other.value_type().name())),
        }
    }

    /// Reads a string as UTF-8 text.
    pub fn string(&self, v: Value) -> VmResult<String> {
        let inner = self.lock();
        match &inner.obj(v)?.data {
            ObjectData::Str { bytes, .. } => Ok(String::from_utf8_lossy(bytes).into_owned()),
            other => Err(VmError::type_mismatch("string", other.value_type().name())),
        }
    }

    /// Reads a string's raw bytes.
    pub fn string_bytes(&self, v: Value) -> VmResult<Vec<u8>> {
        let inner = self.lock();
        match &inner.obj(v)?.data {
            ObjectData::Str { bytes, .. } => Ok(bytes.clone()),
            other => Err(VmError::type_mismatch("string", other.value_type().name())),
        }
    }

    /// Reads a range's `(start, end, step)` components.
    pub fn range_parts(&self, v: Value) -> VmResult<(f64, f64, f64)> {
        let inner = self.lock();
        match &inner.obj(v)?.data {
            ObjectData::Range { start, end, step } => Ok((*start, *end, *step)),
            other => Err(VmError::type_mismatch("range", other.value_type().name())),
        }
    }

    /// Reads a channel's opaque host handle.
    pub fn channel_handle(&self, v: Value) -> VmResult<u64> {
        let inner = self.lock();
        match &inner.obj(v)?.data {
            ObjectData::Channel(handle) => Ok(*handle),
            other => Err(VmError::type_mismatch("channel", other.value_type().name())),
        }
    }

    /// Reads a function's arity.
    pub fn function_arity(&self, v: Value) -> VmResult<u8> {
        let inner = self.lock();
        match &inner.obj(v)?.data {
            ObjectData::Function { arity, .. } => Ok(*arity),
            other => Err(VmError::type_mismatch(
                "function",
                other.value_type().name(),
            )),
        }
    }

    /// Truthiness of a value.
    pub fn is_truthy(&self, v: Value) -> VmResult<bool> {
        self.lock()
            .is_truthy_inner(v)
            .ok_or(VmError::DanglingHandle { id: v.id() })
    }

    /// Structural equality (epsilon numbers, order-insensitive maps,
    /// cycle-tolerant).
    pub fn values_equal(&self, a: Value, b: Value) -> VmResult<bool> {
        let inner = self.lock();
        inner.obj(a)?;
        inner.obj(b)?;
        Ok(inner.values_equal_inner(a, b))
    }

    /// The printable form of a value.
    pub fn display(&self, v: Value) -> VmResult<String> {
        let inner = self.lock();
        inner.obj(v)?;
        Ok(inner.display_inner(v, 0, false))
    }

    /// The content hash used for map keys.
    pub fn hash_value(&self, v: Value) -> VmResult<u32> {
        let inner = self.lock();
        inner.obj(v)?;
        Ok(inner.hash_inner(v, 0))
    }

    // ---- List operations -------------------------------------------------

    /// Appends an item to a list, retaining it on behalf of the list.
    /// The caller keeps its own reference.
    pub fn list_push(&self, list: Value, item: Value) -> VmResult<()> {
        let mut inner = self.lock();
        inner.obj(item)?;
        match &inner.obj(list)?.data {
            ObjectData::List(_) => {}
            other => return Err(VmError::type_mismatch("list", other.value_type().name())),
        }
        inner.retain_inner(item);
        let obj = inner.obj_mut(list)?;
        let ObjectData::List(items) = &mut obj.data else {
            unreachable!("checked above");
        };
        let before = items.capacity();
        if items.len() == items.capacity() {
            // Doubling growth; reserve_exact keeps the accounting honest.
            let additional = items.capacity().max(4);
            items.reserve_exact(additional);
        }
        items.push(item);
        let grown = items.capacity() - before;
        inner.allocated_bytes += grown * std::mem::size_of::<Value>();
        Ok(())
    }

    /// Indexes a list or tuple. Negative indices count from the end; an
    /// index equal to the length is out of range. The result is retained
    /// for the caller.
    pub fn list_get(&self, list: Value, index: i64) -> VmResult<Value> {
        let mut inner = self.lock();
        let item = {
            let items: &[Value] = match &inner.obj(list)?.data {
                ObjectData::List(items) => items.as_slice(),
                ObjectData::Tuple(items) => &items[..],
                other => return Err(VmError::type_mismatch("list", other.value_type().name())),
            };
            let idx = effective_index(index, items.len())?;
            items[idx]
        };
        inner.retain_inner(item);
        Ok(item)
    }

    /// Replaces a list element, retaining the new value and releasing the
    /// old one.
    pub fn list_set(&self, list: Value, index: i64, value: Value) -> VmResult<()> {
        let mut inner = self.lock();
        inner.obj(value)?;
        let old = {
            let obj = inner.obj_mut(list)?;
            let items = match &mut obj.data {
                ObjectData::List(items) => items,
                other => return Err(VmError::type_mismatch("list", other.value_type().name())),
            };
            let idx = effective_index(index, items.len())?;
            std::mem::replace(&mut items[idx], value)
        };
        inner.retain_inner(value);
        inner.release_inner(old);
        Ok(())
    }

    /// Indexes a string, producing a fresh one-character string. Negative
    /// indices count from the end.
    pub fn string_char(&self, s: Value, index: i64) -> VmResult<Value> {
        let mut inner = self.lock();
        let ch = {
            let chars: Vec<char> = match &inner.obj(s)?.data {
                ObjectData::Str { bytes, .. } => String::from_utf8_lossy(bytes).chars().collect(),
                other => return Err(VmError::type_mismatch("string", other.value_type().name())),
            };
            let idx = effective_index(index, chars.len())?;
            chars[idx]
        };
        let text = ch.to_string();
        let hash = fnv1a(text.as_bytes());
        Ok(inner.alloc(ObjectData::Str {
            bytes: text.into_bytes(),
            hash,
        }))
    }

    /// Slices a list, tuple or string. `end == -1` means "through the
    /// end"; a start past the end yields an empty result; bounds clamp.
    pub fn slice(&self, base: Value, start: i64, end: i64) -> VmResult<Value> {
        let mut inner = self.lock();
        enum Sliced {
            Items(Vec<Value>),
            Text(String),
        }
        let sliced = match &inner.obj(base)?.data {
            ObjectData::List(items) => Sliced::Items(slice_items(items, start, end)),
            ObjectData::Tuple(items) => Sliced::Items(slice_items(items, start, end)),
            ObjectData::Str { bytes, .. } => {
                let chars: Vec<char> = String::from_utf8_lossy(bytes).chars().collect();
                let (lo, hi) = slice_bounds(start, end, chars.len());
                Sliced::Text(chars[lo..hi].iter().collect())
            }
            other => return Err(VmError::type_mismatch("list", other.value_type().name())),
        };
        match sliced {
            Sliced::Items(items) => {
                for item in &items {
                    inner.retain_inner(*item);
                }
                Ok(inner.alloc(ObjectData::List(items)))
            }
            Sliced::Text(text) => {
                let hash = fnv1a(text.as_bytes());
                Ok(inner.alloc(ObjectData::Str {
                    bytes: text.into_bytes(),
                    hash,
                }))
            }
        }
    }

    /// Length of a list, string (in characters), range, tuple or map.
    pub fn sequence_len(&self, v: Value) -> VmResult<usize> {
        let inner = self.lock();
        match &inner.obj(v)?.data {
            ObjectData::List(items) => Ok(items.len()),
            ObjectData::Tuple(items) => Ok(items.len()),
            ObjectData::Str { bytes, .. } => Ok(String::from_utf8_lossy(bytes).chars().count()),
            ObjectData::Range { start, end, step } => Ok(range_len(*start, *end, *step)),
            ObjectData::Map(table) => Ok(table.len()),
            other => Err(VmError::type_mismatch("list", other.value_type().name())),
        }
    }

    /// One step of sequence iteration: the item at `index`, retained for
    /// the caller, or `None` when the sequence is exhausted. Lists, tuples,
    /// strings and ranges iterate.
    pub fn iter_next(&self, seq: Value, index: usize) -> VmResult<Option<Value>> {
        let mut inner = self.lock();
        enum Next {
            Existing(Value),
            Char(char),
            Number(f64),
            Done,
        }
        let next = match &inner.obj(seq)?.data {
            ObjectData::List(items) => match items.get(index) {
                Some(item) => Next::Existing(*item),
                None => Next::Done,
            },
            ObjectData::Tuple(items) => match items.get(index) {
                Some(item) => Next::Existing(*item),
                None => Next::Done,
            },
            ObjectData::Str { bytes, .. } => {
                match String::from_utf8_lossy(bytes).chars().nth(index) {
                    Some(ch) => Next::Char(ch),
                    None => Next::Done,
                }
            }
            ObjectData::Range { start, end, step } => {
                if index < range_len(*start, *end, *step) {
                    Next::Number(start + index as f64 * step)
                } else {
                    Next::Done
                }
            }
            other => return Err(VmError::type_mismatch("list", other.value_type().name())),
        };
        match next {
            Next::Existing(item) => {
                inner.retain_inner(item);
                Ok(Some(item))
            }
            Next::Char(ch) => {
                let text = ch.to_string();
                let hash = fnv1a(text.as_bytes());
                Ok(Some(inner.alloc(ObjectData::Str {
                    bytes: text.into_bytes(),
                    hash,
                })))
            }
            Next::Number(n) => Ok(Some(inner.alloc(ObjectData::Number(n)))),
            Next::Done => Ok(None),
        }
    }

    // ---- Map operations --------------------------------------------------

    /// Looks up a key; the result (if any) is retained for the caller.
    pub fn map_get(&self, map: Value, key: Value) -> VmResult<Option<Value>> {
        let mut inner = self.lock();
        inner.obj(key)?;
        let hash = inner.hash_inner(key, 0);
        let table = inner.take_map(map)?;
        let found = table.get(hash, |stored| inner.values_equal_inner(stored, key));
        inner.put_map(map, table);
        if let Some(v) = found {
            inner.retain_inner(v);
        }
        Ok(found)
    }

    /// Inserts or updates a pair. On insert both key and value are
    /// retained; on update the stored key is kept, the new value is
    /// retained and the old value released.
    pub fn map_set(&self, map: Value, key: Value, value: Value) -> VmResult<()> {
        let mut inner = self.lock();
        inner.obj(key)?;
        inner.obj(value)?;
        let hash = inner.hash_inner(key, 0);
        let mut table = inner.take_map(map)?;
        let bytes_before = table.slot_bytes();
        let outcome = table.insert(hash, key, value, |stored| {
            inner.values_equal_inner(stored, key)
        });
        let bytes_after = table.slot_bytes();
        inner.put_map(map, table);
        inner.allocated_bytes += bytes_after.saturating_sub(bytes_before);
        match outcome {
            InsertOutcome::Inserted => {
                inner.retain_inner(key);
                inner.retain_inner(value);
            }
            InsertOutcome::Updated { old_value } => {
                inner.retain_inner(value);
                inner.release_inner(old_value);
            }
        }
        Ok(())
    }

    /// Deletes a key, releasing the stored key and value. Returns whether
    /// the key was present. The slot becomes a tombstone; compaction is
    /// deferred to the next growth.
    pub fn map_delete(&self, map: Value, key: Value) -> VmResult<bool> {
        let mut inner = self.lock();
        inner.obj(key)?;
        let hash = inner.hash_inner(key, 0);
        let mut table = inner.take_map(map)?;
        let removed = table.remove(hash, |stored| inner.values_equal_inner(stored, key));
        inner.put_map(map, table);
        match removed {
            Some((stored_key, stored_value)) => {
                inner.release_inner(stored_key);
                inner.release_inner(stored_value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Number of live pairs in a map.
    pub fn map_len(&self, map: Value) -> VmResult<usize> {
        let inner = self.lock();
        match &inner.obj(map)?.data {
            ObjectData::Map(table) => Ok(table.len()),
            other => Err(VmError::type_mismatch("map", other.value_type().name())),
        }
    }

    /// Every live `(key, value)` pair of a map, each handle retained for
    /// the caller.
    pub fn map_entries(&self, map: Value) -> VmResult<Vec<(Value, Value)>> {
        let mut inner = self.lock();
        let entries = match &inner.obj(map)?.data {
            ObjectData::Map(table) => table.entries(),
            other => return Err(VmError::type_mismatch("map", other.value_type().name())),
        };
        for (k, v) in &entries {
            inner.retain_inner(*k);
            inner.retain_inner(*v);
        }
        Ok(entries)
    }

    // ---- Statistics and collection --------------------------------------

    /// Number of tracked heap objects.
    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    /// Size estimate of all tracked objects.
    pub fn allocated_bytes(&self) -> usize {
        self.lock().allocated_bytes
    }

    /// Runs one mark & sweep pass over the tracker, reclaiming values
    /// trapped in reference cycles. Returns the number reclaimed.
    ///
    /// Safe at a quiescent point: values referenced from outside the heap
    /// graph must hold more than one reference (or be pinned through
    /// [`Runtime::collect_cycles_with_roots`]).
    pub fn collect_cycles(&self) -> usize {
        self.lock().collect_cycles_inner(&[])
    }

    /// Like [`Runtime::collect_cycles`], additionally treating the given
    /// handles as roots. Interpreters pass their operand stack, scope
    /// bindings and constant pool here.
    pub fn collect_cycles_with_roots(&self, roots: &[Value]) -> usize {
        self.lock().collect_cycles_inner(roots)
    }
}

/// Resolves a possibly negative index against a length.
fn effective_index(index: i64, len: usize) -> VmResult<usize> {
    let idx = if index < 0 { index + len as i64 } else { index };
    if idx < 0 || idx as usize >= len {
        return Err(VmError::index_out_of_range(index, len));
    }
    Ok(idx as usize)
}

/// Clamped slice bounds; `end == -1` is the "through the end" sentinel.
fn slice_bounds(start: i64, end: i64, len: usize) -> (usize, usize) {
    let lo = start.clamp(0, len as i64) as usize;
    let hi = if end == -1 {
        len
    } else {
        end.clamp(0, len as i64) as usize
    };
    if lo > hi {
        (lo, lo)
    } else {
        (lo, hi)
    }
}

fn slice_items(items: &[Value], start: i64, end: i64) -> Vec<Value> {
    let (lo, hi) = slice_bounds(start, end, items.len());
    items[lo..hi].to_vec()
}

/// Number of values a range produces, end-inclusive, honoring direction.
fn range_len(start: f64, end: f64, step: f64) -> usize {
    if step > 0.0 {
        if end >= start {
            ((end - start) / step).floor() as usize + 1
        } else {
            0
        }
    } else if end <= start {
        ((start - end) / (-step)).floor() as usize + 1
    } else {
        0
    }
}
