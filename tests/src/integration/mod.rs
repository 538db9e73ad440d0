//! Cross-crate flows.

pub mod flows;
pub mod persistence;
pub mod tcp;
