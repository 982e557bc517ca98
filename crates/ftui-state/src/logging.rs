//! Logging shim over `tracing`.
//!
//! With the `tracing` feature enabled, modules import `tracing`'s macros from
//! here. Without it the crate-root macros below expand to nothing, and
//! modules import those instead:
//!
//! ```ignore
//! #[cfg(feature = "tracing")]
//! use crate::logging::warn;
//! #[cfg(not(feature = "tracing"))]
//! use crate::warn;
//! ```

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, trace, warn};

#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{}};
}
