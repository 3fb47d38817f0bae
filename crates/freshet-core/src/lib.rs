//! # Freshet Core
//!
//! The core of Freshet, an embeddable push-based reactive dataflow engine.
//!
//! Programs describe computations as compositions of [`Stream`]s — lazy,
//! lifecycle-managed sequences of items terminated by a completion or an
//! error signal — and execute them under a cooperative, single-threaded
//! scheduler that interposes asynchronous boundaries between operator
//! stages.
//!
//! This crate provides:
//! - **Streams**: source primitives, stateless and stateful operators,
//!   higher-order operators over streams-of-streams
//! - **Hubs**: multicast fan-out with subject, replay, behavior and
//!   async-last variants, plus connectable/ref-counted wrappers
//! - **Scheduler**: a virtual monotonic clock with delayed and periodic
//!   timers
//! - **Processor units**: round-budgeted cooperative task execution with
//!   runaway detection
//!
//! ## Design Principles
//!
//! 1. **Strictly push** — no request-n backpressure; control flow for
//!    cancellation runs upstream through the subscription chain
//! 2. **Single-threaded cooperative** — signal handlers run to completion;
//!    the scheduler is the only suspension mechanism
//! 3. **Pure until subscribed** — a stream is a description, not a live
//!    producer; every subscription is independent except through hubs
//!
//! ## Example
//!
//! ```rust
//! use freshet_core::source;
//! use freshet_core::testing::TestSubscriber;
//!
//! let (subscriber, probe) = TestSubscriber::new();
//! source::range(42, 20).take(5).subscribe(subscriber);
//!
//! assert_eq!(probe.items(), vec![42, 43, 44, 45, 46]);
//! assert!(probe.is_completed());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod config;
pub mod hub;
pub mod operator;
pub mod scheduler;
pub mod source;
pub mod stream;
pub mod task;
pub mod testing;
pub mod unit;

// Re-export key types
pub use config::Config;
pub use hub::{Connectable, Hub};
pub use scheduler::{Scheduler, TimerHandle};
pub use stream::{Stream, StreamError, Subscriber, Subscription};
pub use unit::ProcessorUnit;

/// Result type for freshet-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for freshet-core.
///
/// These are *library* errors returned by fallible engine APIs. Errors that
/// travel through a stream as a terminal signal are [`StreamError`] values,
/// which are data rather than control flow.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Scheduler-related errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] scheduler::SchedulerError),

    /// Hub and connectable-stream errors
    #[error("Hub error: {0}")]
    Hub(#[from] hub::HubError),
}
