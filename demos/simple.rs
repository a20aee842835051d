use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fieldload::{BoxError, DisplayCodec, FetchArgs, FetchFunction, Loader, LoaderRegistry};

// Empty functor that implements the FetchFunction trait. For this example, it
// trivially looks values up in a shared HashMap, one slot per identity.
struct MovieTitles;

#[async_trait]
impl FetchFunction<String> for MovieTitles {
    type Context = Arc<HashMap<String, String>>;

    async fn fetch_many(
        identities: &[String],
        _args: &FetchArgs,
        context: &Self::Context,
    ) -> Result<Vec<Option<String>>, BoxError> {
        Ok(identities.iter().map(|id| context.get(id).cloned()).collect())
    }
}

#[tokio::main]
async fn main() {
    let mut titles = HashMap::new();
    titles.insert("2001".to_owned(), "a space odyssey".to_owned());
    titles.insert("7".to_owned(), "samurai".to_owned());
    titles.insert("12".to_owned(), "angry men".to_owned());

    // One registry per top-level request; the engine threads it through the
    // request-scoped context it hands to every field resolver.
    let loader: Loader<i64, String> = Loader::new(MovieTitles, DisplayCodec, Arc::new(titles));
    let registry = LoaderRegistry::builder().with_loader("titles", loader).build();
    let titles = registry.get::<i64, String>("titles").unwrap();

    assert_eq!(titles.load(7).await.unwrap().as_deref(), Some("samurai"));
    assert_eq!(titles.load(15).await.unwrap(), None);

    assert_eq!(
        titles
            .load_many(vec![12, 2010, 2001])
            .await
            .unwrap()
            .iter()
            .map(Option::as_deref)
            .collect::<Vec<_>>(),
        vec![Some("angry men"), None, Some("a space odyssey")]
    );
}
