use std::fmt::Debug;
use std::marker::PhantomData;
use std::slice;

use futures::future::FutureExt;
use tokio::sync::mpsc;

use crate::{
    cache::{Cache, CachedResult},
    error::LoadError,
    fetch_function::FetchFunction,
    key::{FetchArgs, KeyCodec},
    loader_op::{LoadRequest, LoaderOp},
};
#[cfg(feature = "stats")]
use crate::worker_stats::WorkerStats;

/// A `LoaderWorker` is the "single-thread" worker task that actually does the loading work.
///
/// Once started, it runs in a loop until the parent Loader aborts it's `JoinHandle` or drops the
/// request queue tx channel.
///
/// The worker can be in one of three states during its lifetime:
///
/// 1. Waiting for requests
/// 2. Flushing the request queue and staging identities for loading.
/// 3. Executing its batched fetch function.
///
/// One cycle through this loop may be called an "execution frame"; states (2) and (3) together
/// realize one batch window.
///
/// In state (1), the worker awaits any messages on the request queue channel, idling until work arrives.
///
/// In state (2), the worker will synchronously pull requests from the queue until it receives a
/// NoneType indicating that there are no more pending requests. Prime and Clear requests are
/// resolved immediately by synchronously issuing requests to the cache. For Load requests, the
/// worker canonicalizes each key and checks whether every identity can be resolved immediately
/// from the cache. If so, it immediately sends the entries on the load request's response channel,
/// otherwise it stages the missing identities (deduplicated, in first-seen order) into the current
/// window and merges the keys' auxiliary arguments, last write winning on conflicting names.
///
/// In state (3), the worker invokes its `FetchFunction` with the staged identity set and the
/// window's merged arguments, then resets both buffers so the next frame starts an empty window.
/// Results are memoized positionally: element *i* of the returned sequence settles identity *i*,
/// with `None` memoized as an explicit not-found. A length mismatch or a failed fetch memoizes
/// the same `LoadError` for every staged identity. Outstanding Load requests are then resolved
/// from the cache.
pub struct LoaderWorker<K, V, F, C, CacheT, ContextT>
where
    K: 'static + Debug + Clone + Send + Sync,
    V: 'static + Send + Debug + Clone,
    F: 'static + FetchFunction<V, Context = ContextT> + Send,
    C: 'static + KeyCodec<K> + Send,
    CacheT: Cache,
    ContextT: Send + Sync + 'static,
{
    cache: CacheT,
    codec: C,
    request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V>>,
    staged_ids: Vec<String>,
    staged_args: FetchArgs,
    pending_requests: Vec<LoadRequest<K, V>>,
    context: ContextT,
    #[cfg(feature = "stats")]
    stats: WorkerStats,
    phantom_fetch_function: PhantomData<F>,
    debug_name: &'static str,
}

impl<K, V, F, C, CacheT, ContextT> LoaderWorker<K, V, F, C, CacheT, ContextT>
where
    K: 'static + Debug + Clone + Send + Sync,
    V: 'static + Send + Debug + Clone,
    F: 'static + FetchFunction<V, Context = ContextT> + Send,
    C: 'static + KeyCodec<K> + Send,
    CacheT: Cache<K = String, V = CachedResult<V>>,
    ContextT: Send + Sync + 'static,
{
    pub fn new(
        cache: CacheT,
        codec: C,
        request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V>>,
        context: ContextT,
    ) -> Self {
        Self {
            cache,
            codec,
            request_rx,
            staged_ids: Vec::new(),
            staged_args: FetchArgs::new(),
            pending_requests: Vec::new(),
            context,
            #[cfg(feature = "stats")]
            stats: WorkerStats::new(std::any::type_name::<(K, V)>()),
            phantom_fetch_function: PhantomData,
            debug_name: std::any::type_name::<(K, V)>(),
        }
    }

    pub async fn start(mut self) {
        loop {
            // Async await until we receive the first op.
            match self.request_rx.recv().await {
                None => {
                    tracing::info!(kv = self.debug_name, "Tx channel closed. Terminating LoaderWorker.");
                    return;
                }
                Some(op) => self.mux_op(op),
            }
            // Flush remainder of the op queue before dispatching the window.
            while let Some(Some(op)) = self.request_rx.recv().now_or_never() {
                self.mux_op(op);
            }
            if !self.pending_requests.is_empty() {
                self.execute_load().await;
            }
        }
    }

    #[tracing::instrument(skip(self))]
    fn mux_op(&mut self, op: LoaderOp<K, V>) {
        match op {
            LoaderOp::Load(request) => {
                let identities = request
                    .keys()
                    .iter()
                    .map(|key| self.codec.canonicalize(key))
                    .collect::<Vec<_>>();
                let cached = self.cache.get(&identities);
                #[cfg(feature = "stats")]
                {
                    self.stats.record_load_request(identities.len() as u32);
                    self.stats
                        .record_cache_hits(cached.iter().filter(|entry| entry.is_some()).count() as u32);
                }
                let missing = cached
                    .iter()
                    .enumerate()
                    .filter_map(|(index, entry)| entry.is_none().then_some(index))
                    .collect::<Vec<_>>();
                tracing::debug!(requested_identities = ?identities, ?missing);
                if missing.is_empty() {
                    request.send_response(cached);
                } else {
                    for index in missing {
                        let identity = &identities[index];
                        if !self.staged_ids.contains(identity) {
                            self.staged_ids.push(identity.clone());
                        }
                        // Merge the key's auxiliary arguments into the window's single
                        // argument object, last write winning on conflicting names. A
                        // window mixing differing arguments for one identity therefore
                        // resolves under the merged set, and every requester of that
                        // identity receives the same answer.
                        if let Some(arguments) = self.codec.arguments(&request.keys()[index]) {
                            for (name, value) in arguments {
                                self.staged_args.insert(name, value);
                            }
                        }
                    }
                    self.pending_requests.push(request);
                }
            }
            LoaderOp::Prime(key, value) => {
                let identity = self.codec.canonicalize(&key);
                self.cache.insert(identity, Ok(Some(value)));
            }
            LoaderOp::PrimeMany(key_vals) => {
                let entries = key_vals
                    .into_iter()
                    .map(|(key, value)| (self.codec.canonicalize(&key), Ok(Some(value))));
                self.cache.insert_many(entries);
            }
            LoaderOp::Clear(key) => {
                let identity = self.codec.canonicalize(&key);
                self.cache.remove(slice::from_ref(&identity));
            }
            LoaderOp::ClearMany(keys) => {
                let identities =
                    keys.iter().map(|key| self.codec.canonicalize(key)).collect::<Vec<_>>();
                self.cache.remove(&identities);
            }
            LoaderOp::ClearAll => self.cache.flush(),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn execute_load(&mut self) {
        // Dispatch closes the current window; the staged buffers are reset so
        // that ops arriving during the fetch start a fresh batch.
        let identities = std::mem::take(&mut self.staged_ids);
        let args = std::mem::take(&mut self.staged_args);
        #[cfg(feature = "stats")]
        self.stats.record_dispatch(identities.len() as u32);

        match F::fetch_many(&identities, &args, &self.context).await {
            Ok(values) if values.len() == identities.len() => {
                #[cfg(feature = "stats")]
                self.stats
                    .record_dispatch_completed(values.iter().filter(|value| value.is_some()).count()
                        as u32);
                tracing::debug!(?values);
                self.cache.insert_many(identities.into_iter().zip(values.into_iter().map(Ok)));
            }
            Ok(values) => {
                let error =
                    LoadError::ShapeMismatch { expected: identities.len(), actual: values.len() };
                tracing::error!(%error, "fetch function violated its positional contract");
                self.cache
                    .insert_many(identities.into_iter().map(|identity| (identity, Err(error.clone()))));
            }
            Err(e) => {
                let error = LoadError::FetchFailed { message: e.to_string() };
                tracing::error!(%error, "batched fetch failed");
                self.cache
                    .insert_many(identities.into_iter().map(|identity| (identity, Err(error.clone()))));
            }
        }

        for request in self.pending_requests.drain(..) {
            let identities = request
                .keys()
                .iter()
                .map(|key| self.codec.canonicalize(key))
                .collect::<Vec<_>>();
            let entries = self.cache.get(&identities);
            request.send_response(entries);
        }
    }
}
