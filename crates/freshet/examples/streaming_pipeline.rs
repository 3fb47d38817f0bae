//! A timed pipeline driven by the virtual clock.
//!
//! Run with: `cargo run --example streaming_pipeline`

use freshet::prelude::*;

fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let scheduler = Scheduler::new();

    // A sensor that ticks every 50 clock units, with readings debounced
    // until they settle for 75 units.
    source::periodic(&scheduler, 50)
        .map(|tick| 100 + tick * 3)
        .filter(|reading| reading % 2 == 0)
        .debounce_fixed(&scheduler, 75)
        .take(3)
        .for_each(|reading| println!("settled reading: {reading}"));

    // Drive the clock forward; all emission happens inside advance_to.
    scheduler.advance_to(2_000);

    println!("clock stopped at t={}", scheduler.now());
}
