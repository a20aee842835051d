use std::ops::Drop;
use std::{collections::HashMap, fmt::Debug};

use tokio::sync::{mpsc, oneshot};
use tracing::{span, Level};
use tracing_futures::Instrument;

use crate::{
    cache::CachedResult,
    error::LoadError,
    fetch_function::FetchFunction,
    key::KeyCodec,
    loader_op::{LoadRequest, LoaderOp},
    loader_worker::LoaderWorker,
};

/// Batch loads values from some expensive resource, primarily intended for mitigating the N+1
/// problem in graph-shaped query execution.
///
/// Users call [`Loader::load`] and [`Loader::load_many`] to fetch values from the underlying
/// resource or cache. The cache can be cleared with calls to [`Loader::clear`],
/// [`Loader::clear_many`], and [`Loader::clear_all`], and values can be added to the cache
/// out-of-band through the use of [`Loader::prime`] and [`Loader::prime_many`].
///
/// The `Loader` struct acts as an intermediary between the async domain in which `load` calls are
/// invoked and the pseudo-single-threaded domain of the `LoaderWorker`. Callers can invoke the
/// `Loader` from multiple parallel tasks, and the loader will enqueue the requested operations on
/// the request queue for processing by its `LoaderWorker`. The worker processes the requests
/// sequentially and provides results via response oneshot channels back to the Loader.
///
/// Batching is strictly request-scoped: a `Loader` (and its cache) is built for one top-level
/// request, usually through a [`LoaderRegistry`](crate::LoaderRegistry), and dropped with it.
/// For a given identity the fetch function runs at most once per loader lifetime; explicit
/// not-founds and batch failures are memoized the same way loaded values are.
///
/// Known imprecision: keys carrying auxiliary arguments (see
/// [`ArgKey`](crate::ArgKey)) contribute to a single per-window argument object, merged
/// last-write-wins. Callers providing genuinely different arguments for the same identity within
/// one batch window receive the same answer for that identity.
pub struct Loader<K, V>
where
    K: 'static + Debug + Clone + Send + Sync,
    V: 'static + Send + Debug + Clone,
{
    request_tx: mpsc::UnboundedSender<LoaderOp<K, V>>,
    load_task_handle: tokio::task::JoinHandle<()>,
}

impl<K, V> Drop for Loader<K, V>
where
    K: 'static + Debug + Clone + Send + Sync,
    V: 'static + Send + Debug + Clone,
{
    fn drop(&mut self) {
        self.load_task_handle.abort();
    }
}

impl<K, V> Loader<K, V>
where
    K: 'static + Debug + Clone + Send + Sync,
    V: 'static + Send + Debug + Clone,
{
    /// Creates a new Loader for the provided FetchFunction, KeyCodec, and Context type.
    ///
    /// Note: the fetch function is passed in as a marker for type inference.
    pub fn new<F, C, ContextT>(_: F, codec: C, context: ContextT) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + FetchFunction<V, Context = ContextT> + Send,
        C: 'static + KeyCodec<K> + Send,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker_span = span!(Level::TRACE, "loader_worker", kv = std::any::type_name::<(K, V)>());
        Self {
            request_tx: tx,
            load_task_handle: tokio::task::spawn(
                LoaderWorker::<K, V, F, C, HashMap<String, CachedResult<V>>, ContextT>::new(
                    HashMap::new(),
                    codec,
                    rx,
                    context,
                )
                .start()
                .instrument(worker_span),
            ),
        }
    }

    /// Loads a value from the underlying resource.
    ///
    /// Returns `Ok(None)` if the fetch function reported no data for the key, and an error if the
    /// batch the key belonged to failed or violated the fetch contract.
    ///
    /// If the key's identity is already in the loader cache, the memoized outcome is returned as
    /// soon as the request is processed. Otherwise, the identity is staged for batch loading in
    /// the next loader execution frame.
    pub async fn load(&self, key: K) -> Result<Option<V>, LoadError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx.send(LoaderOp::Load(LoadRequest::One(key, response_tx))).unwrap();
        response_rx.await.unwrap()
    }

    /// Loads many values at once, preserving key order in the response.
    ///
    /// Returns `None` for values that the fetch function reported no data for. If any requested
    /// key belonged to a failed batch, the whole call reports that batch's error.
    ///
    /// If all the values are already present in the loader cache, they are returned as soon as
    /// the request is processed by the worker. Otherwise, the missing identities are staged for
    /// batch loading in the next loader execution frame.
    pub async fn load_many(&self, keys: Vec<K>) -> Result<Vec<Option<V>>, LoadError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx.send(LoaderOp::Load(LoadRequest::Many(keys, response_tx))).unwrap();
        response_rx.await.unwrap()
    }

    /// Adds a value to the cache.
    pub async fn prime(&self, key: K, value: V) {
        self.request_tx.send(LoaderOp::Prime(key, value)).unwrap();
    }

    /// Adds many values to the cache at once.
    pub async fn prime_many(&self, key_vals: Vec<(K, V)>) {
        self.request_tx.send(LoaderOp::PrimeMany(key_vals)).unwrap();
    }

    /// Removes a value from the cache.
    ///
    /// This key will be reloaded when it is next requested. Clearing is also the escape hatch for
    /// a memoized batch failure.
    pub async fn clear(&self, key: K) {
        self.request_tx.send(LoaderOp::Clear(key)).unwrap();
    }

    /// Removes multiple values from the cache at once.
    ///
    /// These keys will be reloaded when requested.
    pub async fn clear_many(&self, keys: Vec<K>) {
        self.request_tx.send(LoaderOp::ClearMany(keys)).unwrap();
    }

    /// Empties the cache entirely.
    pub async fn clear_all(&self) {
        self.request_tx.send(LoaderOp::ClearAll).unwrap();
    }
}
