use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::SchemaError;
use crate::field::{ArgumentSpec, FieldDescriptor, ResolveFn};
use crate::key::FetchArgs;

/// The post-processing step of a transform: receives the field's resolved
/// value and the transform's own (already defaulted) arguments.
pub type TransformFn = Arc<dyn Fn(Value, &FetchArgs) -> Value + Send + Sync>;

/// A named, declarative post-processing step attachable to a field at
/// schema-build time: the extra arguments it adds to the field (with their
/// defaults) and the function applied to the field's resolved value.
#[derive(Clone)]
pub struct TransformDescriptor {
    pub arguments: IndexMap<String, ArgumentSpec>,
    pub apply: TransformFn,
}

impl fmt::Debug for TransformDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformDescriptor")
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

impl TransformDescriptor {
    pub fn new<F>(apply: F) -> Self
    where
        F: Fn(Value, &FetchArgs) -> Value + Send + Sync + 'static,
    {
        Self { arguments: IndexMap::new(), apply: Arc::new(apply) }
    }

    pub fn with_argument(mut self, name: impl Into<String>, default: Option<Value>) -> Self {
        self.arguments.insert(name.into(), ArgumentSpec { default });
        self
    }
}

/// Build-time registry mapping transform names to descriptors.
///
/// Transforms are registered once at process start and applied to field
/// descriptors while the schema is constructed, before any request is served.
/// Application mutates the field in place and is neither re-entrant nor safe
/// to run concurrently with request execution; both error cases are meant to
/// abort startup.
#[derive(Debug, Default)]
pub struct FieldTransformRegistry {
    transforms: HashMap<String, TransformDescriptor>,
}

impl FieldTransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        descriptor: TransformDescriptor,
    ) -> Result<(), SchemaError> {
        match self.transforms.entry(name.into()) {
            Entry::Occupied(entry) => {
                Err(SchemaError::DuplicateTransform { name: entry.key().clone() })
            }
            Entry::Vacant(entry) => {
                entry.insert(descriptor);
                Ok(())
            }
        }
    }

    /// Applies the named transform to `field`.
    ///
    /// The field's argument schema is extended with the transform's arguments;
    /// a value in `declared_args` (fixed where the transform is declared on
    /// the field) becomes that argument's schema-level default, otherwise the
    /// transform's own default is kept. The field's resolution function is
    /// replaced with the wrapped composition.
    pub fn apply_to_field(
        &self,
        field: &mut FieldDescriptor,
        name: &str,
        declared_args: &FetchArgs,
    ) -> Result<(), SchemaError> {
        let descriptor = self
            .transforms
            .get(name)
            .ok_or_else(|| SchemaError::UnknownTransform { name: name.to_string() })?;

        let mut transform_args = IndexMap::new();
        for (arg_name, spec) in &descriptor.arguments {
            let default = declared_args.get(arg_name).cloned().or_else(|| spec.default.clone());
            transform_args.insert(arg_name.clone(), ArgumentSpec { default });
        }
        for (arg_name, spec) in &transform_args {
            field.arguments.insert(arg_name.clone(), spec.clone());
        }

        tracing::debug!(field = %field.name, transform = name, "wrapping field resolver");
        field.resolve = wrap_resolver(field.resolve.clone(), descriptor.apply.clone(), transform_args);
        Ok(())
    }
}

/// Composes a transform onto an original resolution function.
///
/// The replacement resolver splits the call-time arguments: the transform's
/// own arguments are stripped out (explicit per-call values winning over the
/// defaults folded in at application time) so the original business logic
/// never observes them. The original value is awaited; null short-circuits to
/// null without invoking the transform, anything else is handed to it.
pub fn wrap_resolver(
    original: ResolveFn,
    apply: TransformFn,
    transform_args: IndexMap<String, ArgumentSpec>,
) -> ResolveFn {
    Arc::new(move |mut ctx| {
        let mut args = FetchArgs::new();
        for (name, spec) in &transform_args {
            match ctx.args.remove(name) {
                Some(value) => {
                    args.insert(name.clone(), value);
                }
                None => {
                    if let Some(default) = &spec.default {
                        args.insert(name.clone(), default.clone());
                    }
                }
            }
        }
        let inner = original(ctx);
        let apply = apply.clone();
        Box::pin(async move {
            let raw = inner.await?;
            if raw.is_null() {
                return Ok(Value::Null);
            }
            Ok(apply(raw, &args))
        })
    })
}
