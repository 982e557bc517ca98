#![forbid(unsafe_code)]

//! Reactive state notification for FrankenTUI views.
//!
//! # Role in FrankenTUI
//! `ftui-state` is the model-side half of a view binding. A view registers a
//! redraw trigger on one of these objects, the object calls it whenever its
//! state changes, and the view removes the trigger (or disposes the object)
//! on teardown.
//!
//! # Primary types
//! - [`ChangeNotifier`]: ordered listener registry with `once` listeners,
//!   safe mutation during dispatch, and a terminal disposed state.
//! - [`Observable`]: a single value that notifies subscribers only when it
//!   actually changes.
//! - [`Command`]: a sync or async action behind an `Idle → Running → Done`
//!   status machine, with panics captured into its [`Outcome`].
//! - [`Listenable`]: the listener surface view adapters bind to.
//! - [`Subscription`]: RAII guard that unregisters a listener on drop.
//!
//! # Threading
//! Everything here is single-threaded (`Rc`, `RefCell`) and meant to live on
//! the UI thread. Listeners run synchronously on the caller's stack.
//!
//! # Example
//!
//! ```
//! use ftui_state::{Command, CommandStatus, Listenable, Observable, Outcome};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let count = Observable::new(0);
//! let seen = Rc::new(Cell::new(0));
//! let seen_in_cb = Rc::clone(&seen);
//! let _sub = count.subscribe(move |v| seen_in_cb.set(*v));
//! count.set(3);
//! assert_eq!(seen.get(), 3);
//!
//! let save: Command<&str> = Command::new(|()| Outcome::success("saved"));
//! let redraws = Rc::new(Cell::new(0));
//! let redraws_in_cb = Rc::clone(&redraws);
//! let _redraw = save.listen(move || redraws_in_cb.set(redraws_in_cb.get() + 1));
//! pollster::block_on(save.run());
//! assert_eq!(save.status(), CommandStatus::Done);
//! assert_eq!(redraws.get(), 2);
//! ```

mod logging;

pub mod command;
pub mod error;
pub mod notifier;
pub mod observable;
pub mod outcome;

pub use command::{Command, CommandState, CommandStatus, Execution};
pub use error::{ActionPanic, CommandError};
pub use notifier::{ChangeNotifier, Listenable, Listener, ListenerOptions, Subscription};
pub use observable::Observable;
pub use outcome::Outcome;
