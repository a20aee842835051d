use thiserror::Error;

/// Boxed error surfaced by collaborator code (fetch functions, resolvers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures observed by callers of [`Loader::load`](crate::Loader::load).
///
/// A single underlying failure fans out to every pending caller of the batch,
/// so the error is clonable and carries the collaborator failure as a message
/// rather than as a source chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The fetch function failed; every entry staged in that batch window
    /// observes the same failure. The loader does not retry.
    #[error("batch fetch failed: {message}")]
    FetchFailed { message: String },

    /// The fetch function returned a sequence whose length differs from the
    /// identity list it was given. This is a collaborator bug, distinct from
    /// "no data found".
    #[error("batch shape mismatch: {expected} identities, {actual} results")]
    ShapeMismatch { expected: usize, actual: usize },
}

/// Schema-build-time configuration errors.
///
/// These are raised while transforms are registered and applied to fields,
/// before the first request is served; they are meant to abort startup.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("transform already registered: {name}")]
    DuplicateTransform { name: String },

    #[error("unknown transform: {name}")]
    UnknownTransform { name: String },
}
