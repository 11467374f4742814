#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

//! The on-disk outbound queue: message listing, removal after delivery, and
//! bouncing into the failed directory.

pub mod error;
pub mod store;

pub use error::{Result, SpoolError};
pub use store::{QueuedMessage, Spool};
