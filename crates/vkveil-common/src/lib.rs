//! Shared plumbing for the vkveil layer crates.

pub mod logging;
