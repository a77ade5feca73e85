//! Builtin function registry for the Kronos VM.
//!
//! The embedder provides a map from names (including dotted module names
//! like `regex.match`) to host functions; `CALL_FUNC` consults it before
//! the user function table. The default registry carries the pure builtins
//! — string, math, list and map helpers plus `to_string`, which f-string
//! compilation depends on. I/O builtins (`read_file`, `regex.*`, …) are the
//! host's concern and are registered through the same hook.

use hashbrown::HashMap;

use crate::error::{VmError, VmResult};
use crate::runtime::Runtime;
use crate::value::{Value, ValueType};

/// A builtin function.
///
/// Arguments are borrowed — the caller keeps ownership of their references
/// and releases them after the call. The returned value is an owned
/// reference transferred to the caller; a builtin returning one of its
/// arguments must retain it first.
pub type BuiltinFn = fn(&Runtime, &[Value]) -> VmResult<Value>;

/// A registered builtin.
#[derive(Clone)]
pub struct BuiltinDescriptor {
    /// The callable name, possibly module-prefixed.
    pub name: String,

    /// The handler.
    pub handler: BuiltinFn,
}

/// Name-to-handler registry of builtin functions.
#[derive(Clone)]
pub struct BuiltinRegistry {
    entries: HashMap<String, BuiltinDescriptor>,
}

impl BuiltinRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Creates a registry populated with the default builtins.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_defaults();
        registry
    }

    /// Registers a builtin, replacing any previous entry with that name.
    pub fn register(&mut self, name: &str, handler: BuiltinFn) {
        self.entries.insert(
            name.to_string(),
            BuiltinDescriptor {
                name: name.to_string(),
                handler,
            },
        );
    }

    /// Looks up a handler by name.
    pub fn get(&self, name: &str) -> Option<BuiltinFn> {
        self.entries.get(name).map(|d| d.handler)
    }

    /// Whether a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, unsorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn register_defaults(&mut self) {
        self.register("to_string", builtin_to_string);
        self.register("to_number", builtin_to_number);
        self.register("to_bool", builtin_to_bool);
        self.register("len", builtin_len);
        self.register("uppercase", builtin_uppercase);
        self.register("lowercase", builtin_lowercase);
        self.register("trim", builtin_trim);
        self.register("split", builtin_split);
        self.register("join", builtin_join);
        self.register("contains", builtin_contains);
        self.register("starts_with", builtin_starts_with);
        self.register("ends_with", builtin_ends_with);
        self.register("replace", builtin_replace);
        self.register("reverse", builtin_reverse);
        self.register("sort", builtin_sort);
        self.register("sqrt", builtin_sqrt);
        self.register("power", builtin_power);
        self.register("abs", builtin_abs);
        self.register("round", builtin_round);
        self.register("floor", builtin_floor);
        self.register("ceil", builtin_ceil);
        self.register("rand", builtin_rand);
        self.register("min", builtin_min);
        self.register("max", builtin_max);
        self.register("mod", builtin_mod);
        self.register("add", builtin_add);
        self.register("subtract", builtin_subtract);
        self.register("multiply", builtin_multiply);
        self.register("divide", builtin_divide);
        self.register("range", builtin_range);
        self.register("map_new", builtin_map_new);
        self.register("map_get", builtin_map_get);
        self.register("map_set", builtin_map_set);
        self.register("map_delete", builtin_map_delete);
        self.register("raise", builtin_raise);
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn want_args(name: &str, args: &[Value], expected: usize) -> VmResult<()> {
    if args.len() != expected {
        return Err(VmError::ArityMismatch {
            name: name.to_string(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

fn builtin_to_string(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("to_string", args, 1)?;
    let text = rt.display(args[0])?;
    Ok(rt.new_string(text.as_bytes()))
}

fn builtin_to_number(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("to_number", args, 1)?;
    match rt.type_of(args[0])? {
        ValueType::Number => {
            rt.retain(args[0]);
            Ok(args[0])
        }
        ValueType::Bool => {
            let b = rt.boolean(args[0])?;
            Ok(rt.new_number(if b { 1.0 } else { 0.0 }))
        }
        ValueType::Str => {
            let text = rt.string(args[0])?;
            match text.trim().parse::<f64>() {
                Ok(n) => Ok(rt.new_number(n)),
                Err(_) => {
                    let message = format!("cannot parse {text:?} as a number");
                    Err(VmError::builtin("to_number", message.as_str()))
                }
            }
        }
        other => Err(VmError::type_mismatch("number or string", other.name())),
    }
}

fn builtin_to_bool(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("to_bool", args, 1)?;
    Ok(rt.new_bool(rt.is_truthy(args[0])?))
}

fn builtin_len(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("len", args, 1)?;
    Ok(rt.new_number(rt.sequence_len(args[0])? as f64))
}

fn builtin_uppercase(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("uppercase", args, 1)?;
    let text = rt.string(args[0])?;
    Ok(rt.new_string(text.to_uppercase().as_bytes()))
}

fn builtin_lowercase(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("lowercase", args, 1)?;
    let text = rt.string(args[0])?;
    Ok(rt.new_string(text.to_lowercase().as_bytes()))
}

fn builtin_trim(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("trim", args, 1)?;
    let text = rt.string(args[0])?;
    Ok(rt.new_string(text.trim().as_bytes()))
}

fn builtin_split(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("split", args, 2)?;
    let text = rt.string(args[0])?;
    let sep = rt.string(args[1])?;
    let list = rt.new_list(0);
    let parts: Vec<&str> = if sep.is_empty() {
        text.split_whitespace().collect()
    } else {
        text.split(sep.as_str()).collect()
    };
    for part in parts {
        let item = rt.new_string(part.as_bytes());
        rt.list_push(list, item)?;
        rt.release(item);
    }
    Ok(list)
}

fn builtin_join(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("join", args, 2)?;
    let sep = rt.string(args[1])?;
    let len = rt.sequence_len(args[0])?;
    let mut parts = Vec::with_capacity(len);
    for i in 0..len {
        let item = rt.list_get(args[0], i as i64)?;
        let text = rt.display(item);
        rt.release(item);
        parts.push(text?);
    }
    Ok(rt.new_string(parts.join(&sep).as_bytes()))
}

fn builtin_contains(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("contains", args, 2)?;
    let found = match rt.type_of(args[0])? {
        ValueType::Str => {
            let haystack = rt.string(args[0])?;
            let needle = rt.string(args[1])?;
            haystack.contains(&needle)
        }
        ValueType::List | ValueType::Tuple => {
            let len = rt.sequence_len(args[0])?;
            let mut found = false;
            for i in 0..len {
                let item = rt.list_get(args[0], i as i64)?;
                let equal = rt.values_equal(item, args[1]);
                rt.release(item);
                if equal? {
                    found = true;
                    break;
                }
            }
            found
        }
        ValueType::Map => {
            let got = rt.map_get(args[0], args[1])?;
            match got {
                Some(v) => {
                    rt.release(v);
                    true
                }
                None => false,
            }
        }
        other => return Err(VmError::type_mismatch("string, list or map", other.name())),
    };
    Ok(rt.new_bool(found))
}

fn builtin_starts_with(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("starts_with", args, 2)?;
    let text = rt.string(args[0])?;
    let prefix = rt.string(args[1])?;
    Ok(rt.new_bool(text.starts_with(&prefix)))
}

fn builtin_ends_with(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("ends_with", args, 2)?;
    let text = rt.string(args[0])?;
    let suffix = rt.string(args[1])?;
    Ok(rt.new_bool(text.ends_with(&suffix)))
}

fn builtin_replace(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("replace", args, 3)?;
    let text = rt.string(args[0])?;
    let from = rt.string(args[1])?;
    let to = rt.string(args[2])?;
    Ok(rt.new_string(text.replace(&from, &to).as_bytes()))
}

fn builtin_reverse(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("reverse", args, 1)?;
    match rt.type_of(args[0])? {
        ValueType::Str => {
            let text: String = rt.string(args[0])?.chars().rev().collect();
            Ok(rt.new_string(text.as_bytes()))
        }
        ValueType::List | ValueType::Tuple => {
            let len = rt.sequence_len(args[0])?;
            let out = rt.new_list(len);
            for i in (0..len).rev() {
                let item = rt.list_get(args[0], i as i64)?;
                rt.list_push(out, item)?;
                rt.release(item);
            }
            Ok(out)
        }
        other => Err(VmError::type_mismatch("string or list", other.name())),
    }
}

fn builtin_sort(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("sort", args, 1)?;
    let len = rt.sequence_len(args[0])?;
    let mut items = Vec::with_capacity(len);
    for i in 0..len {
        // Borrow only; the source list keeps its references.
        let item = rt.list_get(args[0], i as i64)?;
        rt.release(item);
        items.push(item);
    }

    let all_numbers = items
        .iter()
        .all(|v| matches!(rt.type_of(*v), Ok(ValueType::Number)));
    if all_numbers {
        let mut keyed: Vec<(f64, Value)> = Vec::with_capacity(items.len());
        for v in items {
            keyed.push((rt.number(v)?, v));
        }
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
        let out = rt.new_list(keyed.len());
        for (_, v) in keyed {
            rt.list_push(out, v)?;
        }
        return Ok(out);
    }

    let all_strings = items
        .iter()
        .all(|v| matches!(rt.type_of(*v), Ok(ValueType::Str)));
    if all_strings {
        let mut keyed: Vec<(String, Value)> = Vec::with_capacity(items.len());
        for v in items {
            keyed.push((rt.string(v)?, v));
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        let out = rt.new_list(keyed.len());
        for (_, v) in keyed {
            rt.list_push(out, v)?;
        }
        return Ok(out);
    }

    Err(VmError::builtin(
        "sort",
        "list must be all numbers or all strings",
    ))
}

fn builtin_sqrt(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("sqrt", args, 1)?;
    Ok(rt.new_number(rt.number(args[0])?.sqrt()))
}

fn builtin_power(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("power", args, 2)?;
    Ok(rt.new_number(rt.number(args[0])?.powf(rt.number(args[1])?)))
}

fn builtin_abs(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("abs", args, 1)?;
    Ok(rt.new_number(rt.number(args[0])?.abs()))
}

fn builtin_round(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("round", args, 1)?;
    Ok(rt.new_number(rt.number(args[0])?.round()))
}

fn builtin_floor(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("floor", args, 1)?;
    Ok(rt.new_number(rt.number(args[0])?.floor()))
}

fn builtin_ceil(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("ceil", args, 1)?;
    Ok(rt.new_number(rt.number(args[0])?.ceil()))
}

fn builtin_rand(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("rand", args, 0)?;
    Ok(rt.new_number(rand::random::<f64>()))
}

fn builtin_min(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("min", args, 2)?;
    Ok(rt.new_number(rt.number(args[0])?.min(rt.number(args[1])?)))
}

fn builtin_max(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("max", args, 2)?;
    Ok(rt.new_number(rt.number(args[0])?.max(rt.number(args[1])?)))
}

fn builtin_mod(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("mod", args, 2)?;
    let a = rt.number(args[0])?;
    let b = rt.number(args[1])?;
    if b == 0.0 {
        return Err(VmError::division_by_zero("mod"));
    }
    Ok(rt.new_number(a % b))
}

fn builtin_add(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("add", args, 2)?;
    Ok(rt.new_number(rt.number(args[0])? + rt.number(args[1])?))
}

fn builtin_subtract(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("subtract", args, 2)?;
    Ok(rt.new_number(rt.number(args[0])? - rt.number(args[1])?))
}

fn builtin_multiply(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("multiply", args, 2)?;
    Ok(rt.new_number(rt.number(args[0])? * rt.number(args[1])?))
}

fn builtin_divide(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("divide", args, 2)?;
    let b = rt.number(args[1])?;
    if b == 0.0 {
        return Err(VmError::division_by_zero("divide"));
    }
    Ok(rt.new_number(rt.number(args[0])? / b))
}

fn builtin_range(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    if args.len() != 2 && args.len() != 3 {
        return Err(VmError::ArityMismatch {
            name: "range".to_string(),
            expected: 2,
            actual: args.len(),
        });
    }
    let start = rt.number(args[0])?;
    let end = rt.number(args[1])?;
    let step = if args.len() == 3 {
        rt.number(args[2])?
    } else {
        1.0
    };
    Ok(rt.new_range(start, end, step))
}

fn builtin_map_new(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("map_new", args, 0)?;
    Ok(rt.new_map(0))
}

fn builtin_map_get(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("map_get", args, 2)?;
    match rt.map_get(args[0], args[1])? {
        Some(v) => Ok(v),
        None => Ok(rt.new_nil()),
    }
}

fn builtin_map_set(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("map_set", args, 3)?;
    rt.map_set(args[0], args[1], args[2])?;
    Ok(rt.new_nil())
}

fn builtin_map_delete(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("map_delete", args, 2)?;
    let removed = rt.map_delete(args[0], args[1])?;
    Ok(rt.new_bool(removed))
}

fn builtin_raise(rt: &Runtime, args: &[Value]) -> VmResult<Value> {
    want_args("raise", args, 1)?;
    Err(VmError::Raised {
        message: rt.display(args[0])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(rt: &Runtime, reg: &BuiltinRegistry, name: &str, args: &[Value]) -> VmResult<Value> {
        reg.get(name).expect("builtin registered")(rt, args)
    }

    #[test]
    fn test_to_string_and_len() {
        let rt = Runtime::new();
        let reg = BuiltinRegistry::new();

        let n = rt.new_number(42.0);
        let s = call(&rt, &reg, "to_string", &[n]).unwrap();
        assert_eq!(rt.string(s).unwrap(), "42");

        let text = rt.new_string(b"hello");
        let len = call(&rt, &reg, "len", &[text]).unwrap();
        assert_eq!(rt.number(len).unwrap(), 5.0);
    }

    #[test]
    fn test_string_builtins() {
        let rt = Runtime::new();
        let reg = BuiltinRegistry::new();

        let s = rt.new_string(b"  Hello World  ");
        let trimmed = call(&rt, &reg, "trim", &[s]).unwrap();
        assert_eq!(rt.string(trimmed).unwrap(), "Hello World");

        let upper = call(&rt, &reg, "uppercase", &[trimmed]).unwrap();
        assert_eq!(rt.string(upper).unwrap(), "HELLO WORLD");

        let sep = rt.new_string(b" ");
        let parts = call(&rt, &reg, "split", &[trimmed, sep]).unwrap();
        assert_eq!(rt.sequence_len(parts).unwrap(), 2);

        let dash = rt.new_string(b"-");
        let joined = call(&rt, &reg, "join", &[parts, dash]).unwrap();
        assert_eq!(rt.string(joined).unwrap(), "Hello-World");
    }

    #[test]
    fn test_numeric_builtins() {
        let rt = Runtime::new();
        let reg = BuiltinRegistry::new();

        let nine = rt.new_number(9.0);
        let three = call(&rt, &reg, "sqrt", &[nine]).unwrap();
        assert_eq!(rt.number(three).unwrap(), 3.0);

        let two = rt.new_number(2.0);
        let eight = call(&rt, &reg, "power", &[two, rt.new_number(3.0)]).unwrap();
        assert_eq!(rt.number(eight).unwrap(), 8.0);

        let seven = rt.new_number(7.0);
        let rem = call(&rt, &reg, "mod", &[seven, two]).unwrap();
        assert_eq!(rt.number(rem).unwrap(), 1.0);

        let zero = rt.new_number(0.0);
        assert!(matches!(
            call(&rt, &reg, "divide", &[seven, zero]),
            Err(VmError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_sort_and_reverse() {
        let rt = Runtime::new();
        let reg = BuiltinRegistry::new();

        let list = rt.new_list(0);
        for n in [3.0, 1.0, 2.0] {
            let v = rt.new_number(n);
            rt.list_push(list, v).unwrap();
            rt.release(v);
        }
        let sorted = call(&rt, &reg, "sort", &[list]).unwrap();
        let first = rt.list_get(sorted, 0).unwrap();
        assert_eq!(rt.number(first).unwrap(), 1.0);

        let reversed = call(&rt, &reg, "reverse", &[sorted]).unwrap();
        let first = rt.list_get(reversed, 0).unwrap();
        assert_eq!(rt.number(first).unwrap(), 2.0);
    }

    #[test]
    fn test_map_builtins_roundtrip() {
        let rt = Runtime::new();
        let reg = BuiltinRegistry::new();

        let map = call(&rt, &reg, "map_new", &[]).unwrap();
        let k = rt.new_string(b"a");
        let v = rt.new_number(1.0);
        call(&rt, &reg, "map_set", &[map, k, v]).unwrap();

        let got = call(&rt, &reg, "map_get", &[map, k]).unwrap();
        assert_eq!(rt.number(got).unwrap(), 1.0);

        let removed = call(&rt, &reg, "map_delete", &[map, k]).unwrap();
        assert!(rt.boolean(removed).unwrap());

        let missing = call(&rt, &reg, "map_get", &[map, k]).unwrap();
        assert_eq!(rt.type_of(missing).unwrap(), ValueType::Nil);
    }

    #[test]
    fn test_raise_produces_raised_error() {
        let rt = Runtime::new();
        let reg = BuiltinRegistry::new();
        let msg = rt.new_string(b"boom");
        let err = call(&rt, &reg, "raise", &[msg]).unwrap_err();
        assert_eq!(err, VmError::Raised { message: "boom".into() });
    }

    #[test]
    fn test_custom_registration_overrides() {
        fn always_seven(rt: &Runtime, _args: &[Value]) -> VmResult<Value> {
            Ok(rt.new_number(7.0))
        }
        let rt = Runtime::new();
        let mut reg = BuiltinRegistry::new();
        reg.register("regex.match", always_seven);
        assert!(reg.contains("regex.match"));
        let out = call(&rt, &reg, "regex.match", &[]).unwrap();
        assert_eq!(rt.number(out).unwrap(), 7.0);
    }
}
