#![forbid(unsafe_code)]

//! Immutable success-or-failure values.
//!
//! [`Outcome<T, E>`] is what a [`Command`](crate::Command) action produces
//! and what the command stores as its last result. Unlike
//! `std::result::Result`, a success may carry no value at all, which is how
//! actions that only report "it worked" are modelled.
//!
//! An `Outcome` has no mutating accessors. Commands keep it behind an `Rc`
//! and hand out clones of that `Rc`, so every reader sees the same
//! allocation and the error payload is never copied.

use std::fmt;

/// Success with an optional value, or failure with an error.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Outcome<T, E> {
    /// The action completed. `None` means it produced no value.
    Success(Option<T>),
    /// The action failed with `E`.
    Failure(E),
}

impl<T, E> Outcome<T, E> {
    /// A success carrying `value`.
    #[must_use]
    pub const fn success(value: T) -> Self {
        Self::Success(Some(value))
    }

    /// A success without a value.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Success(None)
    }

    /// A failure carrying `error`.
    #[must_use]
    pub const fn failure(error: E) -> Self {
        Self::Failure(error)
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// The success value, if this is a success that carries one.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success(value) => value.as_ref(),
            Self::Failure(_) => None,
        }
    }

    /// The error, if this is a failure.
    #[must_use]
    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }

    /// Map the success value, leaving failures untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U, E> {
        match self {
            Self::Success(value) => Outcome::Success(value.map(f)),
            Self::Failure(error) => Outcome::Failure(error),
        }
    }

    /// Convert into a standard `Result`.
    pub fn into_result(self) -> Result<Option<T>, E> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(error) => Err(error),
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(error) => Self::failure(error),
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Outcome<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(value) => f.debug_struct("Success").field("value", value).finish(),
            Self::Failure(error) => f.debug_struct("Failure").field("error", error).finish(),
        }
    }
}
