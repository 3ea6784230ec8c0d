//! A decorative terminal spinner.
//!
//! Configure a [`Spinner`] with chained setters and call [`Spinner::run`]; it
//! animates until its action finishes, its [`Context`] is cancelled or the user
//! presses Ctrl+C.

pub mod config;
pub mod context;
pub mod logger;
pub mod program;
pub mod shell;
pub mod spinner;

pub use context::{Context, ContextError};
pub use program::{OutputTarget, ProgramOption};
pub use spinner::{Error, Spinner, SpinnerType};
