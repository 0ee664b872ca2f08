//! Fuzz target for path text parsing
//!
//! Feeds arbitrary strings to both path parsers and checks that anything
//! they accept re-renders consistently.
//!
//! # Invariants
//!
//! - Parsers never panic, only return Err
//! - path_to_int(s) == Ok(v) implies path_to_int(path_from_int(v)) == Ok(v)
//! - KeyPath::from_str(s) == Ok(p) implies p.to_string() parses back to p

#![no_main]

use std::str::FromStr;

use hdcrypt_crypto::{KeyPath, path_from_int, path_to_int};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|text: &str| {
    if let Ok(value) = path_to_int(text) {
        let canonical = path_from_int(value);
        assert_eq!(path_to_int(&canonical).ok(), Some(value));
    }

    if let Ok(path) = KeyPath::from_str(text) {
        let rendered = path.to_string();
        assert_eq!(KeyPath::from_str(&rendered).ok(), Some(path));
    }
});
