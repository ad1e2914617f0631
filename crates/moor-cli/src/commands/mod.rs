//! Command implementations.

pub mod thing;
