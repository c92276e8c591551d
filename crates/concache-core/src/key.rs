//! Stable key derivation for the decorator layer.
//!
//! A [`CacheKey`] is derived from a call signature: an operation identity
//! plus positional and named arguments. Derivation is total, deterministic,
//! and never mutates its inputs. Two call signatures the caller considers
//! equivalent (same operation, same arguments modulo key ordering in a
//! named-argument map) hash and compare equal; see [`CanonicalValue`] for
//! how compound structures are canonicalised.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// The sentinel named argument stripped from every derived key.
///
/// Callers use `use_cache=false` to bypass the cache entirely without that
/// choice becoming part of the key (two calls that differ only in
/// `use_cache` must collide).
const USE_CACHE_SENTINEL: &str = "use_cache";

/// A canonical, hashable rendering of an arbitrary JSON-like value.
///
/// Numbers are rendered through their canonical textual form rather than
/// compared as `f64`, which sidesteps `NaN`/`Eq` pitfalls while still
/// giving scalars a stable hash. Objects are stored in a `BTreeMap`,
/// which is already order-independent, so insertion order in the
/// caller's map can never perturb the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CanonicalValue {
    Null,
    Bool(bool),
    Number(String),
    String(String),
    Array(Vec<CanonicalValue>),
    Object(BTreeMap<String, CanonicalValue>),
}

impl CanonicalValue {
    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.to_string()),
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// An opaque, immutable cache key derived from a call signature.
///
/// `CacheKey` implements `Hash`/`Eq` purely in terms of the operation
/// identity, the positional arguments retained after `skip_prefix`, and
/// the named arguments with [`USE_CACHE_SENTINEL`] removed, never in
/// terms of insertion order or raw textual form of the caller's inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: String,
    positional: Vec<CanonicalValue>,
    named: BTreeMap<String, CanonicalValue>,
}

impl CacheKey {
    /// Derives a key from an operation identity, positional arguments,
    /// named arguments, and a count of leading positional arguments to
    /// skip (e.g. to exclude a method receiver from the key).
    ///
    /// Accepts any `Serialize` arguments; inputs are converted through
    /// `serde_json::to_value`, which only reads the value, so the
    /// caller's arguments are never touched, let alone mutated.
    ///
    /// # Panics
    ///
    /// Panics if an argument fails to serialize. Argument types used as
    /// cache keys are expected to have infallible `Serialize`
    /// implementations (the common case for plain data); a loader whose
    /// arguments can fail to serialize should derive its key manually.
    pub fn derive<P, N>(operation: &str, positional: &[P], named: &N, skip_prefix: usize) -> Self
    where
        P: Serialize,
        N: Serialize,
    {
        let positional = positional
            .iter()
            .skip(skip_prefix)
            .map(|arg| {
                let value = serde_json::to_value(arg).expect("cache key argument must serialize");
                CanonicalValue::from_json(&value)
            })
            .collect();

        let named_value =
            serde_json::to_value(named).expect("cache key named arguments must serialize");
        let named = match named_value {
            Value::Object(map) => map
                .into_iter()
                .filter(|(k, _)| k != USE_CACHE_SENTINEL)
                .map(|(k, v)| (k, CanonicalValue::from_json(&v)))
                .collect(),
            Value::Null => BTreeMap::new(),
            other => {
                // Non-object "named" payload (e.g. a tuple struct): treat it
                // as a single synthetic field so it still participates in
                // equality/hash rather than being silently dropped.
                let mut map = BTreeMap::new();
                map.insert("__named".to_string(), CanonicalValue::from_json(&other));
                map
            }
        };

        Self {
            operation: operation.to_string(),
            positional,
            named,
        }
    }

    /// Derives a key with no named arguments, for callers that only have
    /// positional arguments.
    pub fn derive_positional<P>(operation: &str, positional: &[P], skip_prefix: usize) -> Self
    where
        P: Serialize,
    {
        Self::derive(operation, positional, &Value::Null, skip_prefix)
    }
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    /// Strategy for a small set of named arguments, deduplicated by name
    /// so that reordering the pairs never changes which value a name maps
    /// to (an ambiguous overwrite would make "same keys, different order"
    /// meaningless as a property).
    fn kwargs_strategy() -> impl Strategy<Value = Vec<(String, i64)>> {
        prop::collection::hash_map("[a-z]{1,8}", any::<i64>(), 0..12)
            .prop_map(|map| map.into_iter().collect())
    }

    proptest! {
        /// Property: two named-argument maps built from the same pairs in
        /// different orders derive equal keys.
        #[test]
        fn derive_is_order_independent_over_named_args(
            pairs in kwargs_strategy(),
        ) {
            let forward: HashMap<String, i64> = pairs.iter().cloned().collect();
            let reversed: HashMap<String, i64> = pairs.into_iter().rev().collect();

            let key_a = CacheKey::derive("op", &[] as &[i32], &forward, 0);
            let key_b = CacheKey::derive("op", &[] as &[i32], &reversed, 0);
            prop_assert_eq!(key_a, key_b);
        }
    }
}
