//! # Operators
//!
//! The fluent composition surface: every operator takes a stream and
//! returns a new stream, layering one worker subscription between upstream
//! and downstream at subscribe time.
//!
//! ## Operator families
//!
//! - **Stateless pass-through**: `map`, `try_map`, `filter`, `take`,
//!   `skip`, `take_while`, `drop_while`, `distinct`, `scan`,
//!   `default_if_empty`, `start_with`, the peek family
//! - **Stateful**: `last_n`, `buffer`, `window`, `debounce`,
//!   `throttle_latest`, `sample`, `filter_successive`
//! - **Higher-order** (streams of streams): `merge_all` / `merge_map`,
//!   `concat_all` / `concat_map`, `switch_all` / `switch_map`,
//!   `exhaust_all` / `exhaust_map`
//! - **Recovery**: `on_error_resume_with`, `rescue_then_return`
//! - **Asynchronous boundaries**: `subscribe_on`, `observe_on`, `delay`
//!
//! Each worker composes the shared per-stage state record
//! (`stream::StageLink`): a done flag plus the upstream cancel handle.
//! Workers check the done flag before invoking user code and before
//! forwarding, so a cancel issued re-entrantly from a downstream callback
//! halts delivery at the next item boundary.

mod boundary;
mod chunk;
mod debounce;
mod default_if_empty;
mod distinct;
mod exhaust;
mod filter;
mod last;
mod map;
mod merge;
mod peek;
mod recover;
mod skip;
mod start_with;
mod switch;
mod take;
mod throttle;
