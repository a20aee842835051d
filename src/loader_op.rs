use std::slice;

use tokio::sync::oneshot;

use crate::cache::CachedResult;
use crate::error::LoadError;

/// Set of possible requests that can be sent to the [`LoaderWorker`]
///
/// The three categories of commands are Load, Prime, and Clear; each of which has a single and
/// many variant for convenience.
#[derive(Debug)]
pub enum LoaderOp<K, V> {
    /// Fetch data from the resource wrapped by this data loader (or the cache).
    Load(LoadRequest<K, V>),
    /// Add values to the cache that were fetched from elsewhere.
    Prime(K, V),
    PrimeMany(Vec<(K, V)>),
    /// Remove values from the cache so that they will be reloaded when they are next requested.
    Clear(K),
    ClearMany(Vec<K>),
    ClearAll,
}

#[derive(Debug)]
pub enum LoadRequest<K, V> {
    One(K, oneshot::Sender<Result<Option<V>, LoadError>>),
    Many(Vec<K>, oneshot::Sender<Result<Vec<Option<V>>, LoadError>>),
}

impl<K, V> LoadRequest<K, V>
where
    V: Send + Clone + std::fmt::Debug,
{
    pub fn keys(&self) -> &[K] {
        match self {
            LoadRequest::One(ref key, _) => slice::from_ref(key),
            LoadRequest::Many(ref keys, _) => keys,
        }
    }

    /// Settles the request from cache entries looked up in key order.
    ///
    /// A `Many` request answers with the first memoized failure among its
    /// keys, if any; otherwise with the per-key values. Entries missing from
    /// the cache entirely resolve as not-found.
    pub fn send_response<'a, I>(self, entries: I)
    where
        I: IntoIterator<Item = Option<&'a CachedResult<V>>>,
        V: 'a,
    {
        match self {
            LoadRequest::One(_, response_tx) => {
                let response = match entries.into_iter().next().flatten() {
                    None => Ok(None),
                    Some(Ok(value)) => Ok(value.clone()),
                    Some(Err(error)) => Err(error.clone()),
                };
                if let Err(e) = response_tx.send(response) {
                    tracing::error!(?e, "receiver dropped");
                }
            }
            LoadRequest::Many(_, response_tx) => {
                let mut values = Vec::new();
                let mut failure = None;
                for entry in entries {
                    match entry {
                        None => values.push(None),
                        Some(Ok(value)) => values.push(value.clone()),
                        Some(Err(error)) => {
                            if failure.is_none() {
                                failure = Some(error.clone());
                            }
                        }
                    }
                }
                let response = match failure {
                    Some(error) => Err(error),
                    None => Ok(values),
                };
                if let Err(e) = response_tx.send(response) {
                    tracing::error!(?e, "receiver dropped");
                }
            }
        }
    }
}
