#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

//! Shared plumbing for the ferrymail daemons: logging, the key-per-file
//! configuration store, and local hostname discovery.

pub mod config;
pub mod hostname;
pub mod logging;

pub use tracing;
