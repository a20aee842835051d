use std::fmt::Display;

use serde::Serialize;
use serde_json::Value;

/// Auxiliary arguments carried by batch keys and merged per batch window.
pub type FetchArgs = serde_json::Map<String, Value>;

/// Canonicalizes batch keys into stable string identities.
///
/// The loader keys its cache and its batch windows on the canonical identity,
/// so `canonicalize` must be deterministic and collision-free for distinct
/// logical keys. Keys may additionally carry auxiliary arguments (e.g. a
/// filter flag); those are surfaced through [`KeyCodec::arguments`] and merged
/// last-write-wins across the keys staged in one batch window.
pub trait KeyCodec<K> {
    fn canonicalize(&self, key: &K) -> String;

    /// Auxiliary arguments carried by the key, if any.
    fn arguments(&self, key: &K) -> Option<FetchArgs> {
        let _ = key;
        None
    }
}

/// Codec for scalar keys, using their `Display` form as the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayCodec;

impl<K: Display> KeyCodec<K> for DisplayCodec {
    fn canonicalize(&self, key: &K) -> String {
        key.to_string()
    }
}

/// Codec for structured keys, using their canonical JSON encoding as the
/// identity. Field order of a struct is fixed by its definition, so the
/// encoding is deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<K: Serialize> KeyCodec<K> for JsonCodec {
    fn canonicalize(&self, key: &K) -> String {
        serde_json::to_string(key).expect("batch key must serialize to JSON")
    }
}

/// A batch key combining an identity component with auxiliary arguments.
///
/// Two `ArgKey`s sharing the same identity are resolved by a single fetch;
/// their arguments are merged into one object for the whole window, so keys
/// carrying genuinely different arguments for the same identity receive the
/// same answer (see the merge caveat on [`Loader`](crate::Loader)).
#[derive(Debug, Clone)]
pub struct ArgKey<K> {
    pub id: K,
    pub args: FetchArgs,
}

impl<K> ArgKey<K> {
    pub fn new(id: K) -> Self {
        Self { id, args: FetchArgs::new() }
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }
}

/// Codec for [`ArgKey`], delegating identity to an inner codec and exposing
/// the key's arguments for per-window merging.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgKeyCodec<C>(pub C);

impl<K, C: KeyCodec<K>> KeyCodec<ArgKey<K>> for ArgKeyCodec<C> {
    fn canonicalize(&self, key: &ArgKey<K>) -> String {
        self.0.canonicalize(&key.id)
    }

    fn arguments(&self, key: &ArgKey<K>) -> Option<FetchArgs> {
        if key.args.is_empty() {
            None
        } else {
            Some(key.args.clone())
        }
    }
}
