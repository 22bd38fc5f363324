//! Fuzz target for [`ScanMailbox`] against the reference model
//!
//! # Strategy
//!
//! - Operation sequences: inserts, takes (targeted and wildcard), counts and
//!   time advances decoded from the fuzz input
//! - Configuration: TTL and capacity chosen by the input
//!
//! # Invariants
//!
//! - Every operation returns the same result as the model
//! - A scan is returned by at most one take
//! - Nothing older than the TTL is ever returned
//! - Live scans never exceed capacity

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tapgate_core::{MailboxConfig, ScanMailbox};
use tapgate_harness::{
    model::operation::to_card, ModelCard, ModelMailbox, Operation, OperationResult, SimEnv,
};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    ttl_ms: u16,
    capacity: u8,
    ops: Vec<Operation>,
}

fuzz_target!(|input: FuzzInput| {
    let ttl_ms = u64::from(input.ttl_ms.max(1));
    let capacity = usize::from(input.capacity.max(1));
    let runtime = tapgate_harness::paused_runtime().expect("runtime");

    runtime.block_on(async {
        let config = MailboxConfig { ttl: Duration::from_millis(ttl_ms), capacity };
        let real = ScanMailbox::new(SimEnv::new(), config);
        let mut model = ModelMailbox::new(ttl_ms, capacity);

        for op in &input.ops {
            let expected = model.apply(op);
            let actual = match *op {
                Operation::Insert { card } => {
                    real.insert(to_card(card));
                    OperationResult::Ok
                },
                Operation::AdvanceTime { millis } => {
                    tokio::time::advance(Duration::from_millis(u64::from(millis))).await;
                    OperationResult::Ok
                },
                Operation::Take { card } => OperationResult::Taken(
                    real.take_matching(Operation::wants(card))
                        .map(|event| ModelCard::try_from(event.card().get()).expect("u8 card")),
                ),
                Operation::Count => OperationResult::Count(real.len()),
            };

            assert_eq!(expected, actual, "divergence on {op:?}");
            assert!(real.len() <= capacity);
        }
    });
});
