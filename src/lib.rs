mod cache;
mod date_transform;
mod error;
mod fetch_function;
mod field;
mod key;
mod loader;
mod loader_op;
mod loader_worker;
mod registry;
mod transform;
#[cfg(feature = "stats")]
mod worker_stats;

pub use date_transform::date_transform;
pub use error::{BoxError, LoadError, SchemaError};
pub use fetch_function::FetchFunction;
pub use field::{ArgumentSpec, FieldDescriptor, ResolveFn, ResolveResult, ResolverContext};
pub use key::{ArgKey, ArgKeyCodec, DisplayCodec, FetchArgs, JsonCodec, KeyCodec};
pub use loader::Loader;
pub use registry::{LoaderRegistry, LoaderRegistryBuilder};
pub use transform::{wrap_resolver, FieldTransformRegistry, TransformDescriptor, TransformFn};
