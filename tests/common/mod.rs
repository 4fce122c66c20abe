//! Common test utilities for agc-stream integration tests

#[allow(dead_code)]
pub mod assertions;
#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod instrument;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
pub use instrument::*;
