//! Panic containment as an explicit `Result`.
//!
//! [`catch`] runs a unit of work and turns a panic into a [`Fault`] value, so
//! callers decide what a recovered fault means instead of letting it unwind
//! through the coroutine scheduler.

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// A panic recovered by [`catch`].
pub struct Fault {
    description: String,
    backtrace: Backtrace,
}

impl Fault {
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let description = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::from("unknown panic payload")
        };
        Self {
            description,
            backtrace: Backtrace::capture(),
        }
    }

    /// Panic message when the payload was a string.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Run `f`, converting a panic into `Err(Fault)`.
///
/// The closure is asserted unwind-safe: after a fault the caller must treat
/// anything `f` mutated as partially updated and overwrite it.
pub fn catch<T>(f: impl FnOnce() -> T) -> Result<T, Fault> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| Fault::from_payload(payload.as_ref()))
}
