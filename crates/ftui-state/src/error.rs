//! Error types produced by command actions.

use std::any::Any;
use std::fmt;

use thiserror::Error;

/// A panic captured while running a command action.
///
/// The payload passed to `panic!`/`panic_any` is kept as-is, so callers can
/// downcast it back to whatever was thrown.
pub struct ActionPanic {
    payload: Box<dyn Any + Send>,
}

impl ActionPanic {
    #[must_use]
    pub fn new(payload: Box<dyn Any + Send>) -> Self {
        Self { payload }
    }

    /// The raw panic payload.
    #[must_use]
    pub fn payload(&self) -> &(dyn Any + Send) {
        &*self.payload
    }

    /// Take the raw panic payload back.
    #[must_use]
    pub fn into_payload(self) -> Box<dyn Any + Send> {
        self.payload
    }

    /// The panic message, for payloads produced by `panic!` with a string.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        if let Some(s) = self.payload.downcast_ref::<&'static str>() {
            Some(s)
        } else {
            self.payload.downcast_ref::<String>().map(String::as_str)
        }
    }
}

impl fmt::Debug for ActionPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionPanic")
            .field("message", &self.message())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ActionPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => write!(f, "action panicked: {message}"),
            None => f.write_str("action panicked"),
        }
    }
}

impl std::error::Error for ActionPanic {}

/// Default error type for [`Command`](crate::Command) actions.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{message}")]
    Failed { message: String },

    #[error(transparent)]
    Panicked(#[from] ActionPanic),

    #[error("{0}")]
    Other(Box<dyn std::error::Error + 'static>),
}

impl CommandError {
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn other(error: impl std::error::Error + 'static) -> Self {
        Self::Other(Box::new(error))
    }

    /// The captured panic, if the action panicked.
    #[must_use]
    pub fn as_panic(&self) -> Option<&ActionPanic> {
        match self {
            Self::Panicked(panic) => Some(panic),
            _ => None,
        }
    }
}
