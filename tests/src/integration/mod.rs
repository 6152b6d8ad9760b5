//! Cross-crate scenarios over the in-memory bus.

pub mod delivery;
pub mod helloworld;
pub mod signatures;
