//! Types shared between the dispatch engine and its presentation collaborators.

pub mod domain;
pub mod error;
pub mod protocol;
