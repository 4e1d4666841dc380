//! Lifecycle of background tasks.
//!
//! Pool monitors subscribe to one broadcast signal. `Shutdown::complete`
//! fires it and waits a bounded time for tracked tasks before aborting them.

pub mod shutdown;

pub use shutdown::Shutdown;
