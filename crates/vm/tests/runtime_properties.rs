//! Property-based tests over the runtime's universal invariants.

use proptest::prelude::*;

use kronos_vm::Runtime;

proptest! {
    /// For any k, a lifecycle of {create, retain × k, release × (k + 1)}
    /// destroys the value exactly once and leaves the tracker empty.
    #[test]
    fn refcount_lifecycle_balances(k in 0usize..64, n in proptest::num::f64::NORMAL) {
        let rt = Runtime::new();
        let v = rt.new_number(n);
        for _ in 0..k {
            rt.retain(v);
        }
        prop_assert_eq!(rt.refcount(v).unwrap(), (k + 1) as u32);
        for _ in 0..k {
            rt.release(v);
            prop_assert!(rt.is_live(v));
        }
        rt.release(v);
        prop_assert!(!rt.is_live(v));
        prop_assert_eq!(rt.object_count(), 0);
        prop_assert_eq!(rt.allocated_bytes(), 0);
    }

    /// Any permutation of insertions produces a map that answers every
    /// key with its latest value.
    #[test]
    fn map_insertion_order_is_irrelevant(mut order in Just((0u32..24).collect::<Vec<_>>()).prop_shuffle()) {
        let rt = Runtime::new();
        let map = rt.new_map(0);
        for &i in &order {
            let k = rt.new_string(format!("key-{i}").as_bytes());
            let v = rt.new_number(f64::from(i));
            rt.map_set(map, k, v).unwrap();
            rt.release(k);
            rt.release(v);
        }
        order.sort_unstable();
        for &i in &order {
            let probe = rt.new_string(format!("key-{i}").as_bytes());
            let got = rt.map_get(map, probe).unwrap().expect("key must be present");
            prop_assert_eq!(rt.number(got).unwrap(), f64::from(i));
            rt.release(got);
            rt.release(probe);
        }
        prop_assert_eq!(rt.map_len(map).unwrap(), order.len());
    }

    /// Deleting a subset of keys leaves the rest reachable through
    /// tombstoned probe chains.
    #[test]
    fn map_deletions_preserve_survivors(count in 4usize..32, stride in 2usize..5) {
        let rt = Runtime::new();
        let map = rt.new_map(0);
        for i in 0..count {
            let k = rt.new_number(i as f64);
            let v = rt.new_number((i * 10) as f64);
            rt.map_set(map, k, v).unwrap();
            rt.release(k);
            rt.release(v);
        }
        for i in (0..count).step_by(stride) {
            let k = rt.new_number(i as f64);
            prop_assert!(rt.map_delete(map, k).unwrap());
            rt.release(k);
        }
        for i in 0..count {
            let k = rt.new_number(i as f64);
            let got = rt.map_get(map, k).unwrap();
            if i % stride == 0 {
                prop_assert!(got.is_none());
            } else {
                let v = got.expect("survivor present");
                prop_assert_eq!(rt.number(v).unwrap(), (i * 10) as f64);
                rt.release(v);
            }
            rt.release(k);
        }
    }

    /// Interning is pointer-stable: byte-equal inputs share one handle.
    #[test]
    fn interning_is_stable(words in proptest::collection::vec("[a-z]{1,12}", 1..24)) {
        let rt = Runtime::new();
        for word in &words {
            let first = rt.intern(word.as_bytes());
            let second = rt.intern(word.as_bytes());
            prop_assert_eq!(first, second);
            // Plain allocation never aliases the interned value.
            let fresh = rt.new_string(word.as_bytes());
            prop_assert_ne!(first, fresh);
            prop_assert!(rt.values_equal(first, fresh).unwrap());
        }
    }

    /// Structural equality is insensitive to the order map pairs were
    /// inserted in.
    #[test]
    fn map_equality_is_order_insensitive(order in Just((0u32..12).collect::<Vec<_>>()).prop_shuffle()) {
        let rt = Runtime::new();
        let forward = rt.new_map(0);
        let shuffled = rt.new_map(0);
        for i in 0..12u32 {
            let k = rt.new_string(format!("k{i}").as_bytes());
            let v = rt.new_number(f64::from(i));
            rt.map_set(forward, k, v).unwrap();
            rt.release(k);
            rt.release(v);
        }
        for &i in &order {
            let k = rt.new_string(format!("k{i}").as_bytes());
            let v = rt.new_number(f64::from(i));
            rt.map_set(shuffled, k, v).unwrap();
            rt.release(k);
            rt.release(v);
        }
        prop_assert!(rt.values_equal(forward, shuffled).unwrap());
    }
}
