use async_trait::async_trait;

use crate::error::BoxError;
use crate::key::FetchArgs;

/// A `FetchFunction` defines the method through which some `Loader` fetches
/// batched data from an underlying resource. It receives the deduplicated
/// canonical identities staged during the loader's most recent batch window,
/// the window's merged auxiliary arguments, and a user defined context struct.
///
/// The positional contract is strict: the returned sequence must hold exactly
/// one element per input identity, in input order, with `None` marking an
/// identity the resource has no data for. Shortening the sequence is a bug
/// and surfaces to callers as [`LoadError::ShapeMismatch`](crate::LoadError).
/// A failed call rejects every identity in the window with the same
/// [`LoadError::FetchFailed`](crate::LoadError); the loader does not retry.
///
/// Multiple `FetchFunctions` (and therefore loaders) can share the same
/// context (likely through an `Arc`).
#[async_trait]
pub trait FetchFunction<V> {
    type Context;

    async fn fetch_many(
        identities: &[String],
        args: &FetchArgs,
        context: &Self::Context,
    ) -> Result<Vec<Option<V>>, BoxError>;
}
