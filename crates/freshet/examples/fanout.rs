//! Multicasting one source to several subscribers through a hub.
//!
//! Run with: `cargo run --example fanout`

use freshet::prelude::*;

fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let scheduler = Scheduler::new();

    // One upstream ticker shared by every subscriber; the upstream
    // subscription exists only while someone is listening.
    let ticks = source::periodic(&scheduler, 100).publish_replay(2);
    let shared = ticks.ref_count();

    shared
        .clone()
        .map(|t| t * 10)
        .take(4)
        .for_each(|v| println!("fast consumer: {v}"));

    scheduler.advance_to(250);

    // This subscriber arrives late and first replays the last two ticks.
    shared
        .clone()
        .take(3)
        .for_each(|v| println!("late consumer: {v}"));

    scheduler.advance_to(500);
    println!("done at t={}", scheduler.now());
}
