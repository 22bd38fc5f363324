//! Fuzz target for wire payload and console line parsing
//!
//! Bus payloads and console lines come from outside the process and must
//! never take it down.
//!
//! # Invariants
//!
//! - NEVER panic on any byte sequence
//! - A decoded card re-encodes to the canonical decimal form of its value
//! - A decoded directive is exactly `start` or `stop` after trimming
//! - A parsed `tap`/`ban` line carries the card its argument decodes to

#![no_main]

use libfuzzer_sys::fuzz_target;
use tapgate_core::{CardId, Directive};
use tapgate_server::Command;

fuzz_target!(|data: &[u8]| {
    if let Ok(card) = CardId::from_payload(data) {
        assert_eq!(card.to_payload(), card.get().to_string().as_bytes());

        let text = std::str::from_utf8(data).expect("decoded payloads are UTF-8");
        assert_eq!(text.trim().parse::<u128>().ok(), Some(card.get()));
    }

    if let Ok(directive) = Directive::from_payload(data) {
        let text = std::str::from_utf8(data).expect("decoded payloads are UTF-8");
        assert_eq!(text.trim(), directive.as_str());
    }

    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };

    match line.parse::<Command>() {
        Ok(Command::Tap { card } | Command::Ban { card }) => {
            let arg = line.split_whitespace().nth(1).expect("card argument present");
            assert_eq!(arg.parse::<CardId>().ok(), Some(card));
        },
        Ok(Command::Login { username } | Command::Register { username }) => {
            assert!(!username.is_empty());
            assert!(!username.contains(char::is_whitespace));
        },
        Ok(Command::Identify | Command::Help) | Err(_) => {},
    }
});
