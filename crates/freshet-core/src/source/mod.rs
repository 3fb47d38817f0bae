//! # Source Primitives
//!
//! Constructors for the streams everything else composes from.
//!
//! | Constructor | Semantics |
//! |-------------|-----------|
//! | [`empty`] | subscribe → complete immediately |
//! | [`fail`] | subscribe → error immediately |
//! | [`of`] / [`from_iter`] | emit the given items, then complete |
//! | [`of_option`] | emit the value if present, then complete |
//! | [`range`] | emit `start..start + count`, then complete |
//! | [`never`] | subscribe → nothing, ever |
//! | [`from_supplier`] | emit one supplied item, then complete |
//! | [`try_from_supplier`] | like `from_supplier`, error if the supplier fails |
//! | [`create`] | hand an [`Emitter`] to user code |
//! | [`periodic`] | emit 0, 1, 2, … on a scheduler period; never completes |
//! | [`generate`] | emit supplied items on a scheduler period |
//!
//! Synchronous sources check done-state between items, so a cancel issued
//! from a subscriber callback halts emission at the next item boundary.

mod create;
mod periodic;
mod sync;

pub use create::{create, Emitter};
pub use periodic::{generate, periodic};
pub use sync::{empty, fail, from_iter, from_supplier, never, of, of_option, range, try_from_supplier};
