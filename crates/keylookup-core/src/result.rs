//! Result primitives: failures travel as values, never as panics
//!
//! Anything that can go wrong inside the lookup pipeline is returned as an
//! [`Err`]. The helpers here cover the three places where that needs help:
//!
//! - building an error from loosely shaped input ([`err`] with a [`Cause`])
//! - fencing off code that might panic ([`run`], [`run_async`], [`async_result`])
//! - leaving the `Result` world at a trust boundary ([`expect`])

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};

use crate::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Future that always settles to a [`Result`] and never panics outward
pub type AsyncResult<'a, T> = BoxFuture<'a, Result<T>>;

/// Tagged input for [`err`]
///
/// Each variant names the shape of the cause at the call site, so every input
/// maps to exactly one error.
#[derive(Debug)]
pub enum Cause {
    /// Plain text, used verbatim as the message
    Message(String),
    /// An existing error, passed through untouched
    Error(Error),
    /// An object expected to carry a `message` field of any JSON type
    MessageLike(Value),
    /// Anything else
    Opaque(Value),
}

impl From<&str> for Cause {
    fn from(message: &str) -> Self {
        Cause::Message(message.to_string())
    }
}

impl From<String> for Cause {
    fn from(message: String) -> Self {
        Cause::Message(message)
    }
}

impl From<Error> for Cause {
    fn from(error: Error) -> Self {
        Cause::Error(error)
    }
}

impl From<Cause> for Error {
    fn from(cause: Cause) -> Self {
        match cause {
            Cause::Message(message) => Error::Message(message),
            Cause::Error(error) => error,
            Cause::MessageLike(value) | Cause::Opaque(value) => from_value(value),
        }
    }
}

fn from_value(value: Value) -> Error {
    match value {
        Value::Null => Error::Message(String::new()),
        Value::String(message) => Error::Message(message),
        Value::Object(mut fields) => {
            let message = fields.remove("message").map(coerce_message).unwrap_or_default();
            Error::Opaque { message, fields }
        }
        other => Error::Opaque {
            message: other.to_string(),
            fields: Map::new(),
        },
    }
}

fn coerce_message(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Success with a value; `ok(())` is the void success
pub fn ok<T>(value: T) -> Result<T> {
    Ok(value)
}

/// Failure built from any [`Cause`]
pub fn err<T>(cause: impl Into<Cause>) -> Result<T> {
    Err(Error::from(cause.into()))
}

/// Success carrying an actual value, as opposed to success with nothing found
pub fn is_present<T>(result: &Result<Option<T>>) -> bool {
    matches!(result, Ok(Some(_)))
}

/// Run `action`, turning a panic into [`Error::Panicked`]
pub fn run<T>(action: impl FnOnce() -> Result<T>) -> Result<T> {
    std::panic::catch_unwind(AssertUnwindSafe(action)).unwrap_or_else(|payload| Err(Error::from_panic(payload)))
}

/// Async counterpart of [`run`]
pub async fn run_async<T, F>(action: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    AssertUnwindSafe(action)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(Error::from_panic(payload)))
}

/// Box `action` into an [`AsyncResult`]
pub fn async_result<'a, T, F>(action: F) -> AsyncResult<'a, T>
where
    F: Future<Output = Result<T>> + Send + 'a,
    T: 'a,
{
    run_async(action).boxed()
}

/// Unwrap a success or panic with the cause
///
/// Only for trust boundaries where a failure means the process cannot go on.
pub fn expect<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(cause) => panic!("{}", cause),
    }
}
