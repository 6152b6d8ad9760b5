//! # Handler Shapes
//!
//! Every handler describes its declared shape: one parameter list and one
//! return list. The binder validates the shape before anything touches the
//! bus, and derives the calling convention from it.
//!
//! Typed function handlers (`by_value`, `by_pointer`) always describe a
//! valid shape. Hand-written [`Handler`](crate::Handler) implementations
//! may describe anything and are rejected here when the shape is wrong.

use crate::dispatch::Convention;
use std::any::type_name;
use thiserror::Error;

/// Why a handler shape was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("handler is not a function: {type_name}")]
    NotAFunction { type_name: String },

    #[error("handler must take exactly one argument, found {found}")]
    WrongArity { found: usize },

    #[error("handler must return exactly one value, found {found}")]
    WrongReturnArity { found: usize },

    #[error("handler return type {type_name} is not an error")]
    ReturnNotError { type_name: String },

    #[error("handler argument must not be a function: {type_name}")]
    FunctionParameter { type_name: String },
}

/// Declared kind of one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// Taken by value.
    Value { type_name: String },
    /// Taken through an owning pointer.
    Pointer { type_name: String },
    /// A callable value, which cannot travel over the bus.
    Function { type_name: String },
}

impl ParamKind {
    /// By-value parameter of type `T`.
    pub fn value<T: ?Sized>() -> Self {
        ParamKind::Value {
            type_name: type_name::<T>().to_string(),
        }
    }

    /// By-pointer parameter of type `T`.
    pub fn pointer<T: ?Sized>() -> Self {
        ParamKind::Pointer {
            type_name: type_name::<T>().to_string(),
        }
    }
}

/// Declared kind of one return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnKind {
    /// `Result<(), HandlerError>` or anything assignable to it.
    Error,
    /// Any other type.
    Other { type_name: String },
}

/// The declared shape of a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Function {
        params: Vec<ParamKind>,
        returns: Vec<ReturnKind>,
    },
    NotAFunction {
        type_name: String,
    },
}

impl Shape {
    /// Shape of `fn(param) -> Result<(), HandlerError>`.
    pub fn unary(param: ParamKind) -> Self {
        Shape::Function {
            params: vec![param],
            returns: vec![ReturnKind::Error],
        }
    }

    /// Check the shape and return the calling convention it declares.
    pub fn validate(&self) -> Result<Convention, SignatureError> {
        let (params, returns) = match self {
            Shape::NotAFunction { type_name } => {
                return Err(SignatureError::NotAFunction {
                    type_name: type_name.clone(),
                })
            }
            Shape::Function { params, returns } => (params, returns),
        };

        let [param] = params.as_slice() else {
            return Err(SignatureError::WrongArity {
                found: params.len(),
            });
        };
        let [ret] = returns.as_slice() else {
            return Err(SignatureError::WrongReturnArity {
                found: returns.len(),
            });
        };
        if let ReturnKind::Other { type_name } = ret {
            return Err(SignatureError::ReturnNotError {
                type_name: type_name.clone(),
            });
        }

        match param {
            ParamKind::Value { .. } => Ok(Convention::ByValue),
            ParamKind::Pointer { .. } => Ok(Convention::ByPointer),
            ParamKind::Function { type_name } => Err(SignatureError::FunctionParameter {
                type_name: type_name.clone(),
            }),
        }
    }
}
