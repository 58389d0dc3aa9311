//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of their owner.
//!
//! # Tasks
//! - Expiry sweep: removes expired entries from local maps at a fixed interval

mod cleanup;

pub use cleanup::{spawn_cleanup_task, Sweep};
