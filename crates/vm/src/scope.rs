//! Variable scopes and call frames.
//!
//! A scope maps names to bindings for one lexical activation: the global
//! scope at the bottom, one scope per function call above it. Each binding
//! owns one reference to its value.

use hashbrown::HashMap;

use crate::error::{VmError, VmResult};
use crate::runtime::Runtime;
use crate::value::Value;

/// One variable binding: the value, its mutability, and an optional type
/// annotation recorded at the first store.
#[derive(Debug, Clone)]
pub struct Binding {
    /// The bound value; the binding owns one reference.
    pub value: Value,

    /// Whether the binding may be reassigned.
    pub mutable: bool,

    /// Language-level type name enforced on reassignment, if annotated.
    pub type_name: Option<String>,
}

/// A name-to-binding mapping for one activation.
pub struct Scope {
    bindings: HashMap<String, Binding>,
    runtime: Runtime,
}

impl Scope {
    /// Creates an empty scope.
    pub fn new(runtime: Runtime) -> Self {
        Self {
            bindings: HashMap::new(),
            runtime,
        }
    }

    /// Looks up a binding in this scope only.
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// Binds or rebinds a name, taking ownership of the caller's reference
    /// to `value`.
    ///
    /// Rebinding an immutable name is fatal. A type annotation recorded by
    /// an earlier store is enforced against the new value's type; the
    /// mutability flag and annotation of the incoming store replace the
    /// recorded ones otherwise.
    pub fn bind(
        &mut self,
        name: &str,
        value: Value,
        mutable: bool,
        type_name: Option<String>,
    ) -> VmResult<()> {
        if let Some(existing) = self.bindings.get(name) {
            if !existing.mutable {
                self.runtime.release(value);
                return Err(VmError::ImmutableReassignment {
                    name: name.to_string(),
                });
            }
            if let Some(expected) = &existing.type_name {
                let actual = self.runtime.type_of(value)?.name();
                if expected != actual {
                    self.runtime.release(value);
                    return Err(VmError::type_mismatch(expected.clone(), actual.to_string()));
                }
            }
        }
        if let Some(annotation) = &type_name {
            let actual = self.runtime.type_of(value)?.name();
            if annotation != actual {
                self.runtime.release(value);
                return Err(VmError::type_mismatch(annotation.clone(), actual.to_string()));
            }
        }

        let type_name = match self.bindings.get(name) {
            Some(existing) if type_name.is_none() => existing.type_name.clone(),
            _ => type_name,
        };
        let old = self.bindings.insert(
            name.to_string(),
            Binding {
                value,
                mutable,
                type_name,
            },
        );
        if let Some(old) = old {
            self.runtime.release(old.value);
        }
        Ok(())
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the scope has no bindings.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Every bound value, for GC root pinning. References stay owned by
    /// the scope.
    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        self.bindings.values().map(|b| b.value)
    }

    /// Releases every binding.
    pub fn clear(&mut self) {
        for (_, binding) in self.bindings.drain() {
            self.runtime.release(binding.value);
        }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.clear();
    }
}

/// One call frame: where to return to and which scope to fall back to.
#[derive(Debug, Clone, Copy)]
pub struct CallFrame {
    /// The caller's program counter, restored by `RETURN_VAL`.
    pub return_pc: usize,

    /// Index of the caller's innermost scope.
    pub scope_index: usize,
}
