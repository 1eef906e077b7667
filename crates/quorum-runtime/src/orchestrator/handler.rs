//! Operation handlers.
//!
//! A handler receives the shared request context and the raw JSON
//! arguments of one operation. Most handlers are plain `async fn`s taking
//! a typed argument struct; [`handler`] wraps them so the arguments are
//! deserialized (and rejected with a field name) before the function runs.
//!
//! ```ignore
//! async fn survey(ctx: Arc<RequestContext>, args: ById<SurveyId>) -> Result<Outcome, OperationError> {
//!     let survey = ctx.services.surveys.get(args.id).await?;
//!     Outcome::data(&survey)
//! }
//!
//! registry.query("survey", Access::Permission(Permission::SurveyRead), handler(survey))?;
//! ```

use super::error::OperationError;
use crate::context::RequestContext;
use async_trait::async_trait;
use quorum_event::MutationEvent;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Result of a successful operation.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub data: Value,
    /// Published after the operation returns.
    pub events: Vec<MutationEvent>,
    /// Failures of nested fields that were rendered as `null`. The path is
    /// relative to the operation.
    pub field_errors: Vec<(Vec<String>, OperationError)>,
}

impl Outcome {
    /// Serializes `value` as the operation's data.
    ///
    /// # Errors
    ///
    /// Serialization failures become internal errors.
    pub fn data<T: Serialize>(value: &T) -> Result<Self, OperationError> {
        Ok(Self {
            data: to_value(value)?,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn from_value(data: Value) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_event(mut self, event: MutationEvent) -> Self {
        self.events.push(event);
        self
    }

    #[must_use]
    pub fn with_field_errors(mut self, errors: Vec<(Vec<String>, OperationError)>) -> Self {
        self.field_errors.extend(errors);
        self
    }
}

/// Serializes a response value.
pub(crate) fn to_value<T: Serialize>(value: &T) -> Result<Value, OperationError> {
    serde_json::to_value(value).map_err(|err| {
        OperationError::Service(crate::services::ServiceError::Internal(format!(
            "response serialization failed: {err}"
        )))
    })
}

/// Parses operation arguments. `null` or absent arguments parse as `{}`.
pub fn parse_args<A: DeserializeOwned>(args: Value) -> Result<A, OperationError> {
    let args = if args.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|err| OperationError::from_json(&err))
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: Arc<RequestContext>, args: Value) -> Result<Outcome, OperationError>;
}

/// Adapts an async function over typed arguments into a [`Handler`].
pub struct FnHandler<A, F> {
    f: F,
    _args: PhantomData<fn() -> A>,
}

#[async_trait]
impl<A, F, Fut> Handler for FnHandler<A, F>
where
    A: DeserializeOwned + Send + 'static,
    F: Fn(Arc<RequestContext>, A) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Outcome, OperationError>> + Send,
{
    async fn call(&self, ctx: Arc<RequestContext>, args: Value) -> Result<Outcome, OperationError> {
        let args: A = parse_args(args)?;
        (self.f)(ctx, args).await
    }
}

/// Wraps `f` as a shareable handler.
pub fn handler<A, F, Fut>(f: F) -> Arc<dyn Handler>
where
    A: DeserializeOwned + Send + 'static,
    F: Fn(Arc<RequestContext>, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Outcome, OperationError>> + Send + 'static,
{
    Arc::new(FnHandler {
        f,
        _args: PhantomData,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Args {
        #[serde(default)]
        limit: Option<u32>,
    }

    #[test]
    fn null_args_parse_as_empty_object() {
        let args: Args = parse_args(Value::Null).unwrap();
        assert_eq!(args, Args { limit: None });
    }

    #[test]
    fn unknown_field_is_named() {
        let err = parse_args::<Args>(serde_json::json!({"limt": 3})).unwrap_err();
        match err {
            OperationError::InvalidArguments { field, .. } => assert_eq!(field.as_deref(), Some("limt")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wrong_type_is_invalid_arguments() {
        let err = parse_args::<Args>(serde_json::json!({"limit": "ten"})).unwrap_err();
        assert!(matches!(err, OperationError::InvalidArguments { .. }));
    }
}
