//! Handlers: the functions a name can be bound to.

use crate::dispatch::{Argument, Payload};
use crate::error::HandlerError;
use crate::signature::{ParamKind, Shape};
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

/// A single-argument function that reports success or failure.
///
/// `invoke` receives the argument already adapted to the convention
/// declared by [`shape`](Handler::shape).
#[async_trait]
pub trait Handler<T: Payload>: Send + Sync + 'static {
    /// Declared shape, validated at bind time.
    fn shape(&self) -> Shape;

    /// Run the handler once.
    async fn invoke(&self, arg: Argument<T>) -> Result<(), HandlerError>;
}

/// Handler taking its argument by value.
pub struct ValueHandler<F, T> {
    f: F,
    _arg: PhantomData<fn(T)>,
}

/// Handler taking its argument through a `Box`.
///
/// The box always holds a private copy; mutations are never visible to
/// the caller.
pub struct PointerHandler<F, T> {
    f: F,
    _arg: PhantomData<fn(T)>,
}

/// Bind an async function `Fn(T)`.
pub fn by_value<T, F, Fut>(f: F) -> ValueHandler<F, T>
where
    T: Payload,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    ValueHandler {
        f,
        _arg: PhantomData,
    }
}

/// Bind an async function `Fn(Box<T>)`.
pub fn by_pointer<T, F, Fut>(f: F) -> PointerHandler<F, T>
where
    T: Payload,
    F: Fn(Box<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    PointerHandler {
        f,
        _arg: PhantomData,
    }
}

#[async_trait]
impl<T, F, Fut> Handler<T> for ValueHandler<F, T>
where
    T: Payload,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn shape(&self) -> Shape {
        Shape::unary(ParamKind::value::<T>())
    }

    async fn invoke(&self, arg: Argument<T>) -> Result<(), HandlerError> {
        (self.f)(arg.into_value()).await
    }
}

#[async_trait]
impl<T, F, Fut> Handler<T> for PointerHandler<F, T>
where
    T: Payload,
    F: Fn(Box<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn shape(&self) -> Shape {
        Shape::unary(ParamKind::pointer::<T>())
    }

    async fn invoke(&self, arg: Argument<T>) -> Result<(), HandlerError> {
        (self.f)(arg.into_pointer()).await
    }
}
