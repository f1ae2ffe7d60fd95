//! # Response Module
//!
//! The per-request output container and the single-write machinery behind it.
//!
//! A [`Response`] is mutated by processors and the handler (error, result) and
//! finalized exactly once by the dispatcher. Finalization consumes the
//! [`ResponseSink`] held by the response's [`WriteTarget`]; a second attempt
//! finds the target empty and is refused.
//!
//! The target also carries the atomic claim flag that settles the race between
//! the worker finishing and the response deadline elapsing: whichever side wins
//! [`WriteTarget::claim`] is the only side whose outcome is ever written.

mod core;
mod recorder;

pub use self::core::{Response, ResponseBody, ResponseHead, ResponseSink, WriteTarget};
pub use self::recorder::ResponseRecorder;
