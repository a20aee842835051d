use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fieldload::{
    ArgKey, ArgKeyCodec, BoxError, DisplayCodec, FetchArgs, FetchFunction, JsonCodec, LoadError,
    Loader, LoaderRegistry,
};
use futures::future;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, PartialEq, Eq, Clone)]
struct DummyData(String);

#[derive(Default)]
struct DummyContext {
    map: HashMap<String, String>,
    calls: AtomicUsize,
    batches: Mutex<Vec<Vec<String>>>,
    batch_args: Mutex<Vec<FetchArgs>>,
}

impl DummyContext {
    fn with_entries(entries: &[(i64, &str)]) -> Arc<Self> {
        let mut map = HashMap::new();
        for (key, value) in entries {
            map.insert(key.to_string(), value.to_string());
        }
        Arc::new(Self { map, ..Default::default() })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    fn batch_args(&self) -> Vec<FetchArgs> {
        self.batch_args.lock().unwrap().clone()
    }

    fn record(&self, identities: &[String], args: &FetchArgs) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(identities.to_vec());
        self.batch_args.lock().unwrap().push(args.clone());
    }
}

struct DummyFetch;

#[async_trait]
impl FetchFunction<DummyData> for DummyFetch {
    type Context = Arc<DummyContext>;

    async fn fetch_many(
        identities: &[String],
        args: &FetchArgs,
        context: &Self::Context,
    ) -> Result<Vec<Option<DummyData>>, BoxError> {
        context.record(identities, args);
        Ok(identities.iter().map(|id| context.map.get(id).cloned().map(DummyData)).collect())
    }
}

struct FailingFetch;

#[async_trait]
impl FetchFunction<DummyData> for FailingFetch {
    type Context = Arc<DummyContext>;

    async fn fetch_many(
        identities: &[String],
        args: &FetchArgs,
        context: &Self::Context,
    ) -> Result<Vec<Option<DummyData>>, BoxError> {
        context.record(identities, args);
        Err("backend unavailable".into())
    }
}

/// Returns one result fewer than requested, violating the positional contract.
struct TruncatingFetch;

#[async_trait]
impl FetchFunction<DummyData> for TruncatingFetch {
    type Context = Arc<DummyContext>;

    async fn fetch_many(
        identities: &[String],
        args: &FetchArgs,
        context: &Self::Context,
    ) -> Result<Vec<Option<DummyData>>, BoxError> {
        context.record(identities, args);
        Ok(identities
            .iter()
            .skip(1)
            .map(|id| context.map.get(id).cloned().map(DummyData))
            .collect())
    }
}

#[tokio::test]
async fn basic_load() {
    let context = DummyContext::with_entries(&[(42, "Foo")]);
    let loader: Loader<i64, DummyData> = Loader::new(DummyFetch, DisplayCodec, context.clone());

    assert_eq!(loader.load(42).await, Ok(Some(DummyData("Foo".to_owned()))));
}

#[tokio::test]
async fn repeated_load() {
    let context = DummyContext::with_entries(&[(42, "Foo")]);
    let loader: Loader<i64, DummyData> = Loader::new(DummyFetch, DisplayCodec, context.clone());

    assert_eq!(loader.load(42).await, Ok(Some(DummyData("Foo".to_owned()))));
    assert_eq!(loader.load(42).await, Ok(Some(DummyData("Foo".to_owned()))));
    assert_eq!(context.calls(), 1);
}

#[tokio::test]
async fn basic_load_many() {
    let context = DummyContext::with_entries(&[
        (42, "one fish"),
        (12, "two fish"),
        (5, "red fish"),
        (8, "blue fish"),
    ]);
    let loader: Loader<i64, DummyData> = Loader::new(DummyFetch, DisplayCodec, context.clone());

    assert_eq!(
        loader.load_many(vec![5, 12, 8]).await,
        Ok(vec![
            Some(DummyData("red fish".to_owned())),
            Some(DummyData("two fish".to_owned())),
            Some(DummyData("blue fish".to_owned()))
        ])
    );
}

#[tokio::test]
async fn load_async() {
    let context = DummyContext::with_entries(&[
        (42, "one fish"),
        (12, "two fish"),
        (5, "red fish"),
        (8, "blue fish"),
    ]);
    let loader: Loader<i64, DummyData> = Loader::new(DummyFetch, DisplayCodec, context.clone());

    let tuple = future::join4(
        loader.load(5),
        loader.load_many(vec![5, 42]),
        loader.load(99),
        loader.load(12),
    );

    assert_eq!(
        tuple.await,
        (
            Ok(Some(DummyData("red fish".to_owned()))),
            Ok(vec![
                Some(DummyData("red fish".to_owned())),
                Some(DummyData("one fish".to_owned())),
            ]),
            Ok(None),
            Ok(Some(DummyData("two fish".to_owned())))
        )
    );
    // Everything reachable before the first suspension lands in one window.
    assert_eq!(context.calls(), 1);
    assert_eq!(context.batches(), vec![vec!["5", "42", "99", "12"]]);
}

#[tokio::test]
async fn identical_keys_share_one_fetch() {
    let context = DummyContext::with_entries(&[(42, "Foo")]);
    let loader: Loader<i64, DummyData> = Loader::new(DummyFetch, DisplayCodec, context.clone());

    let (a, b, c) = future::join3(loader.load(42), loader.load(42), loader.load(42)).await;
    let expected = Ok(Some(DummyData("Foo".to_owned())));
    assert_eq!((&a, &b, &c), (&expected, &expected, &expected));
    assert_eq!(context.calls(), 1);
    assert_eq!(context.batches(), vec![vec!["42"]]);
}

#[tokio::test]
async fn results_map_back_in_request_order() {
    let context = DummyContext::with_entries(&[(1, "one"), (2, "two"), (3, "three")]);
    let loader: Loader<i64, DummyData> = Loader::new(DummyFetch, DisplayCodec, context.clone());

    assert_eq!(
        loader.load_many(vec![3, 1, 2]).await,
        Ok(vec![
            Some(DummyData("three".to_owned())),
            Some(DummyData("one".to_owned())),
            Some(DummyData("two".to_owned()))
        ])
    );
    // Identities are dispatched in first-seen order, not sorted.
    assert_eq!(context.batches(), vec![vec!["3", "1", "2"]]);
}

#[tokio::test]
async fn settled_batches_are_never_rejoined() {
    let context = DummyContext::with_entries(&[(42, "Foo")]);
    let loader: Loader<i64, DummyData> = Loader::new(DummyFetch, DisplayCodec, context.clone());

    assert_eq!(loader.load(42).await, Ok(Some(DummyData("Foo".to_owned()))));
    // Once the first window settled, a repeat load is a pure cache hit.
    assert_eq!(loader.load(42).await, Ok(Some(DummyData("Foo".to_owned()))));
    assert_eq!(context.calls(), 1);

    // Clearing evicts the memoized entry, so the next load opens a new window.
    loader.clear(42).await;
    assert_eq!(loader.load(42).await, Ok(Some(DummyData("Foo".to_owned()))));
    assert_eq!(context.calls(), 2);
}

#[tokio::test]
async fn not_found_is_memoized() {
    let context = DummyContext::with_entries(&[]);
    let loader: Loader<i64, DummyData> = Loader::new(DummyFetch, DisplayCodec, context.clone());

    assert_eq!(loader.load(99).await, Ok(None));
    assert_eq!(loader.load(99).await, Ok(None));
    assert_eq!(context.calls(), 1);
}

#[tokio::test]
async fn fetch_failure_fans_out_and_is_memoized() {
    let context = DummyContext::with_entries(&[]);
    let loader: Loader<i64, DummyData> = Loader::new(FailingFetch, DisplayCodec, context.clone());

    let expected = Err(LoadError::FetchFailed { message: "backend unavailable".to_owned() });
    let (a, b) = future::join(loader.load(1), loader.load(2)).await;
    assert_eq!(a, expected);
    assert_eq!(b, expected);
    assert_eq!(context.calls(), 1);

    // The failure is memoized like a value; no retry without an explicit clear.
    assert_eq!(loader.load(1).await, expected);
    assert_eq!(context.calls(), 1);
}

#[tokio::test]
async fn shape_mismatch_is_fatal_for_the_batch() {
    let context = DummyContext::with_entries(&[(1, "one"), (2, "two"), (3, "three")]);
    let loader: Loader<i64, DummyData> =
        Loader::new(TruncatingFetch, DisplayCodec, context.clone());

    assert_eq!(
        loader.load_many(vec![1, 2, 3]).await,
        Err(LoadError::ShapeMismatch { expected: 3, actual: 2 })
    );
}

#[tokio::test]
async fn auxiliary_arguments_merge_last_write_wins() {
    let context = DummyContext::with_entries(&[(7, "seven")]);
    let loader: Loader<ArgKey<i64>, DummyData> =
        Loader::new(DummyFetch, ArgKeyCodec(DisplayCodec), context.clone());

    let results = loader
        .load_many(vec![
            ArgKey::new(7).with_arg("active", true),
            ArgKey::new(7).with_arg("active", false),
        ])
        .await
        .unwrap();

    // One identity, one fetch, one merged argument object; both requesters
    // receive the same answer even though their filters differed.
    assert_eq!(results, vec![
        Some(DummyData("seven".to_owned())),
        Some(DummyData("seven".to_owned()))
    ]);
    assert_eq!(context.calls(), 1);
    assert_eq!(context.batches(), vec![vec!["7"]]);
    assert_eq!(context.batch_args()[0].get("active"), Some(&json!(false)));
}

#[tokio::test]
async fn structured_keys_canonicalize_through_json() {
    #[derive(Debug, Clone, Serialize)]
    struct OrgUser {
        org: i64,
        user: i64,
    }

    let mut map = HashMap::new();
    map.insert(r#"{"org":1,"user":2}"#.to_owned(), "alice".to_owned());
    let context = Arc::new(DummyContext { map, ..Default::default() });
    let loader: Loader<OrgUser, DummyData> = Loader::new(DummyFetch, JsonCodec, context.clone());

    assert_eq!(
        loader.load(OrgUser { org: 1, user: 2 }).await,
        Ok(Some(DummyData("alice".to_owned())))
    );
    // The canonical identity is the key's JSON encoding, so a structurally
    // equal key is a cache hit.
    assert_eq!(loader.load(OrgUser { org: 1, user: 2 }).await, Ok(Some(DummyData("alice".to_owned()))));
    assert_eq!(context.calls(), 1);
    assert_eq!(context.batches(), vec![vec![r#"{"org":1,"user":2}"#]]);
}

#[tokio::test]
async fn primed_values_skip_the_fetch() {
    let context = DummyContext::with_entries(&[]);
    let loader: Loader<i64, DummyData> = Loader::new(DummyFetch, DisplayCodec, context.clone());

    loader.prime(42, DummyData("primed".to_owned())).await;
    assert_eq!(loader.load(42).await, Ok(Some(DummyData("primed".to_owned()))));
    assert_eq!(context.calls(), 0);

    loader
        .prime_many(vec![
            (1, DummyData("a".to_owned())),
            (2, DummyData("b".to_owned())),
        ])
        .await;
    assert_eq!(
        loader.load_many(vec![1, 2]).await,
        Ok(vec![Some(DummyData("a".to_owned())), Some(DummyData("b".to_owned()))])
    );
    assert_eq!(context.calls(), 0);

    loader.clear_all().await;
    assert_eq!(loader.load(42).await, Ok(None));
    assert_eq!(context.calls(), 1);
}

#[tokio::test]
async fn registry_resolves_loaders_by_name_and_type() {
    let context = DummyContext::with_entries(&[(42, "Foo")]);
    let by_id: Loader<i64, DummyData> = Loader::new(DummyFetch, DisplayCodec, context.clone());

    let registry = LoaderRegistry::builder().with_loader("dummies", by_id).build();
    assert_eq!(registry.len(), 1);
    assert!(registry.names().any(|name| name == "dummies"));

    assert!(registry.get::<i64, DummyData>("missing").is_none());
    assert!(registry.get::<String, DummyData>("dummies").is_none());

    let loader = registry.get::<i64, DummyData>("dummies").unwrap();
    assert_eq!(loader.load(42).await, Ok(Some(DummyData("Foo".to_owned()))));
}

#[tokio::test]
async fn five_parents_three_related_entities_one_fetch() {
    let context = DummyContext::with_entries(&[(1, "ada"), (2, "grace"), (3, "edsger")]);
    let loader: Loader<i64, DummyData> = Loader::new(DummyFetch, DisplayCodec, context.clone());

    // Five parent records, each referencing one of three distinct authors.
    let author_ids = vec![1, 2, 1, 3, 2];
    let authors = future::join_all(author_ids.iter().map(|id| loader.load(*id))).await;

    assert_eq!(
        authors,
        vec![
            Ok(Some(DummyData("ada".to_owned()))),
            Ok(Some(DummyData("grace".to_owned()))),
            Ok(Some(DummyData("ada".to_owned()))),
            Ok(Some(DummyData("edsger".to_owned()))),
            Ok(Some(DummyData("grace".to_owned()))),
        ]
    );
    assert_eq!(context.calls(), 1);
    assert_eq!(context.batches(), vec![vec!["1", "2", "3"]]);
}
