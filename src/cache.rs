use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

use crate::error::LoadError;

/// The memoized outcome for one canonical identity.
///
/// `Ok(Some(v))` is a loaded value, `Ok(None)` the explicit not-found marker
/// returned by the fetch function, and `Err` a memoized batch failure. All
/// three states satisfy the at-most-one-fetch guarantee; a failed identity is
/// not refetched unless it is cleared first.
pub type CachedResult<V> = Result<Option<V>, LoadError>;

pub trait Cache {
    type K;
    type V;

    /// Returns the entries associated with the provided keys, in key order.
    fn get(&self, keys: &[Self::K]) -> Vec<Option<&Self::V>>;

    fn insert(&mut self, key: Self::K, value: Self::V);
    fn insert_many<I: IntoIterator<Item = (Self::K, Self::V)>>(&mut self, key_vals: I);

    fn remove(&mut self, keys: &[Self::K]);
    fn flush(&mut self);
}

impl<K, V, S: BuildHasher> Cache for HashMap<K, V, S>
where
    K: Eq + Hash,
{
    type K = K;
    type V = V;

    fn get(&self, keys: &[Self::K]) -> Vec<Option<&Self::V>> {
        keys.iter().map(|k| self.get(k)).collect::<Vec<_>>()
    }

    fn insert(&mut self, key: Self::K, value: Self::V) {
        self.insert(key, value);
    }

    fn insert_many<I: IntoIterator<Item = (Self::K, Self::V)>>(&mut self, key_vals: I) {
        for (key, value) in key_vals.into_iter() {
            self.insert(key, value);
        }
    }

    fn remove(&mut self, keys: &[Self::K]) {
        for key in keys.iter() {
            self.remove(key);
        }
    }

    fn flush(&mut self) {
        self.clear();
    }
}
