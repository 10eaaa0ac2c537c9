//! Extensions to the standard library and to ropey used across the store.

pub mod path;
pub mod rope;
