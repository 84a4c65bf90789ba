//! HTTP handlers and the state they share.

pub mod cache;
pub mod errors;
pub mod rollups;
pub mod state;
