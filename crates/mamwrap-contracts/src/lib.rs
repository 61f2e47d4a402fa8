//! # mamwrap-contracts
//!
//! Shared types, wire schemas, and error contracts for the mamwrap client.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions, their wire forms, and error types.

pub mod credential;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod job;
pub mod policy;
pub mod rule;
