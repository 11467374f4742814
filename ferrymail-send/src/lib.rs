#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

//! Delivery engine of the ferrymail relay-only mail transfer agent.
//!
//! The engine watches the outbound queue and, for each queued message, hands
//! a delivery attempt to an external per-protocol helper process. It owns the
//! message lifecycle (retry, expiry, bounce), the adaptive pause schedule
//! between sweeps, per-sweep configuration reloading, and supervision of the
//! helper children with a send timeout.

pub mod backoff;
pub mod engine;
pub mod errcodes;
pub mod error;
pub mod settings;
pub mod signals;
pub mod supervisor;
pub mod trigger;

pub use engine::Sender;
pub use error::StartupError;
pub use supervisor::Outcome;
