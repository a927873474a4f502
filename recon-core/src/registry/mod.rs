//! Shared per-target state: pollable task status and cancellation handles.
//! These are the only mutable structures shared between scan runs; all
//! locks are held for map operations only.

pub mod cancellation;
pub mod status;

pub use cancellation::{CancellationHandle, CancellationRegistry, ScanToken};
pub use status::TaskStatusRegistry;
