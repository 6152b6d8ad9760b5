//! # Dispatch Adapter
//!
//! Reconciles the calling convention of an argument with the convention a
//! handler declared, so callers may pass either a value or a pointer no
//! matter how the handler takes it.
//!
//! | argument | handler wants | result                              |
//! |----------|---------------|-------------------------------------|
//! | value    | value         | passed through                      |
//! | pointer  | pointer       | passed through                      |
//! | value    | pointer       | boxed into a private copy           |
//! | pointer  | value         | dereferenced                        |

use crate::error::HandlerError;
use crate::handler::Handler;
use crate::signature::SignatureError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Values that can be passed to a remote function.
///
/// Arguments travel as JSON over the bus and are copied for every retry
/// attempt in direct mode.
pub trait Payload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// How a handler takes its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    ByValue,
    ByPointer,
}

/// An argument in one of the two conventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument<T> {
    Value(T),
    Pointer(Box<T>),
}

impl<T> Argument<T> {
    /// Convention this argument is currently in.
    pub fn convention(&self) -> Convention {
        match self {
            Argument::Value(_) => Convention::ByValue,
            Argument::Pointer(_) => Convention::ByPointer,
        }
    }

    /// Borrow the underlying value.
    pub fn get(&self) -> &T {
        match self {
            Argument::Value(v) => v,
            Argument::Pointer(p) => p,
        }
    }

    /// Take the value, dereferencing a pointer.
    pub fn into_value(self) -> T {
        match self {
            Argument::Value(v) => v,
            Argument::Pointer(p) => *p,
        }
    }

    /// Take a pointer, boxing a value.
    pub fn into_pointer(self) -> Box<T> {
        match self {
            Argument::Value(v) => Box::new(v),
            Argument::Pointer(p) => p,
        }
    }
}

/// Convert `arg` to `convention`.
pub fn adapt<T>(arg: Argument<T>, convention: Convention) -> Argument<T> {
    if arg.convention() == convention {
        return arg;
    }
    match convention {
        Convention::ByValue => Argument::Value(arg.into_value()),
        Convention::ByPointer => Argument::Pointer(arg.into_pointer()),
    }
}

/// A validated handler together with the convention it declared.
pub struct Dispatcher<T: Payload> {
    name: String,
    handler: Arc<dyn Handler<T>>,
    convention: Convention,
}

impl<T: Payload> Dispatcher<T> {
    /// Validate the handler's shape and fix its convention.
    pub fn bind<H: Handler<T>>(name: &str, handler: H) -> Result<Self, SignatureError> {
        let convention = handler.shape().validate()?;
        Ok(Self {
            name: name.to_string(),
            handler: Arc::new(handler),
            convention,
        })
    }

    /// Function name this dispatcher serves.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Convention the handler declared.
    pub fn convention(&self) -> Convention {
        self.convention
    }

    /// Adapt `arg` and invoke the handler once.
    pub async fn dispatch(&self, arg: Argument<T>) -> Result<(), HandlerError> {
        self.handler.invoke(adapt(arg, self.convention)).await
    }
}

impl<T: Payload> std::fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name)
            .field("convention", &self.convention)
            .finish_non_exhaustive()
    }
}
