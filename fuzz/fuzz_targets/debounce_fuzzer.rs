//! Fuzz target for the reader [`Debouncer`]
//!
//! # Strategy
//!
//! - Read sequences: arbitrary cards at non-decreasing times, with resets
//! - Window: chosen by the input, including zero
//!
//! # Invariants
//!
//! - The first read after construction or reset is always accepted
//! - A card change is always accepted
//! - Two accepted reads of the same card with no reset or other acceptance
//!   in between are at least one window apart
//! - NEVER panic

#![no_main]

use std::time::{Duration, Instant};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tapgate_core::CardId;
use tapgate_reader::Debouncer;

#[derive(Debug, Clone, Arbitrary)]
enum Event {
    Read { card: u8, advance_ms: u16 },
    Reset,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    window_ms: u16,
    events: Vec<Event>,
}

fuzz_target!(|input: FuzzInput| {
    let window = Duration::from_millis(u64::from(input.window_ms));
    let mut debouncer = Debouncer::new(window);
    let base = Instant::now();
    let mut now = base;
    let mut last: Option<(u8, Instant)> = None;

    for event in input.events {
        match event {
            Event::Reset => {
                debouncer.reset();
                last = None;
            },
            Event::Read { card, advance_ms } => {
                now += Duration::from_millis(u64::from(advance_ms));
                let accepted = debouncer.observe(CardId::new(u128::from(card)), now);

                match last {
                    None => assert!(accepted, "first read must be accepted"),
                    Some((prev, _)) if prev != card => assert!(accepted, "card change accepted"),
                    Some((_, at)) => assert_eq!(accepted, now - at >= window),
                }

                if accepted {
                    last = Some((card, now));
                }
            },
        }
    }
});
