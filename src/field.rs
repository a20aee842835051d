use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::BoxError;
use crate::key::FetchArgs;

pub type ResolveResult = Result<Value, BoxError>;

/// A field's resolution function. Receives the explicit per-call context and
/// produces the field's value.
pub type ResolveFn = Arc<dyn Fn(ResolverContext) -> BoxFuture<'static, ResolveResult> + Send + Sync>;

/// Explicit per-call input to a field resolver: the parent object the field is
/// being resolved on, and the call-time arguments. The execution engine
/// constructs one per field invocation; nothing ambient is threaded through.
#[derive(Debug, Clone, Default)]
pub struct ResolverContext {
    pub parent: Value,
    pub args: FetchArgs,
}

/// One declared argument on a field or transform, with an optional default
/// applied when the caller omits the argument.
#[derive(Debug, Clone, Default)]
pub struct ArgumentSpec {
    pub default: Option<Value>,
}

impl ArgumentSpec {
    pub fn with_default(default: Value) -> Self {
        Self { default: Some(default) }
    }
}

/// Identifies a single field on a single type: its declared arguments and its
/// current resolution function. Transforms applied at schema-build time extend
/// the argument schema and replace the resolution function in place.
#[derive(Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub arguments: IndexMap<String, ArgumentSpec>,
    pub resolve: ResolveFn,
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

impl FieldDescriptor {
    pub fn new<F, Fut>(name: impl Into<String>, resolve: F) -> Self
    where
        F: Fn(ResolverContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolveResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            arguments: IndexMap::new(),
            resolve: Arc::new(move |ctx| resolve(ctx).boxed()),
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, spec: ArgumentSpec) -> Self {
        self.arguments.insert(name.into(), spec);
        self
    }

    /// Runs the field's current resolution function.
    pub async fn resolve_value(&self, parent: Value, args: FetchArgs) -> ResolveResult {
        (self.resolve)(ResolverContext { parent, args }).await
    }
}
