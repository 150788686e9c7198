#![cfg(any(test, feature = "testing"))]

// Test support for code built on top of the user manager
//
// `UserOverride` swaps the manager's directory and backends for in-memory
// fakes for the duration of one test scope and puts the originals back
// afterwards. Users created through the active override are deleted again
// when it is deactivated.
//
// Enable the `testing` feature to use this module from other crates.

mod user_override;

pub use user_override::{ActiveUserOverride, OverrideError, UserOverride};
