//! # Freshet
//!
//! An embeddable push-based reactive dataflow engine.
//!
//! Freshet lets programs express computations as compositions of streams —
//! lazy, lifecycle-managed sequences of items terminated by a completion
//! or an error signal — and executes them under a cooperative,
//! single-threaded scheduler with a virtual clock.
//!
//! # Quick Start
//!
//! ```rust
//! use freshet::prelude::*;
//!
//! let scheduler = Scheduler::new();
//!
//! let (subscriber, probe) = TestSubscriber::new();
//! source::periodic(&scheduler, 100)
//!     .filter(|tick| tick % 2 == 0)
//!     .map(|tick| tick * 10)
//!     .take(2)
//!     .subscribe(subscriber);
//!
//! scheduler.advance_to(300);
//! assert_eq!(probe.items(), vec![0, 20]);
//! assert!(probe.is_completed());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub use freshet_core::*;

/// Commonly used types, in one import.
pub mod prelude {
    pub use freshet_core::config::{self, Config};
    pub use freshet_core::hub::{Connectable, Hub};
    pub use freshet_core::scheduler::Scheduler;
    pub use freshet_core::source;
    pub use freshet_core::stream::{Stream, StreamError, Subscriber, Subscription};
    pub use freshet_core::task::Task;
    pub use freshet_core::testing::TestSubscriber;
    pub use freshet_core::unit::ProcessorUnit;
}
