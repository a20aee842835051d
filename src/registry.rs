use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;

use crate::loader::Loader;

/// A per-request collection of named [`Loader`]s.
///
/// The execution engine builds one registry per top-level request, attaches it
/// to the request-scoped context it threads through field resolvers, and drops
/// it once the result tree has settled. The registry is immutable after
/// [`LoaderRegistryBuilder::build`]; only the loaders' internal caches mutate
/// during the request. Loaders are never shared between two requests'
/// registries.
///
/// Loaders of differing key/value types live side by side; retrieval is typed,
/// and [`LoaderRegistry::get`] returns `None` for a name registered under a
/// different type.
#[derive(Default)]
pub struct LoaderRegistry {
    loaders: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderRegistry").field("names", &self.names().collect::<Vec<_>>()).finish()
    }
}

impl LoaderRegistry {
    pub fn builder() -> LoaderRegistryBuilder {
        LoaderRegistryBuilder::default()
    }

    pub fn get<K, V>(&self, name: &str) -> Option<&Loader<K, V>>
    where
        K: 'static + Debug + Clone + Send + Sync,
        V: 'static + Send + Debug + Clone,
    {
        self.loaders.get(name).and_then(|loader| loader.downcast_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.loaders.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

#[derive(Default)]
pub struct LoaderRegistryBuilder {
    loaders: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl LoaderRegistryBuilder {
    /// Registers a loader under `name`. A repeated name replaces the earlier
    /// registration.
    pub fn with_loader<K, V>(mut self, name: impl Into<String>, loader: Loader<K, V>) -> Self
    where
        K: 'static + Debug + Clone + Send + Sync,
        V: 'static + Send + Debug + Clone,
    {
        self.loaders.insert(name.into(), Box::new(loader));
        self
    }

    pub fn build(self) -> LoaderRegistry {
        LoaderRegistry { loaders: self.loaders }
    }
}
