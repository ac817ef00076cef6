//! # Front Discovery Engine
//!
//! Finds working domain-fronting endpoints for a roster of censored
//! destinations: draws candidate addresses from configured blocks, runs
//! the TCP/TLS/HTTP trial against each, applies the adaptive acceptance
//! policy, and persists what worked for the next session.
//!
//! The [`engine`] module is the entry point; everything else supports it.

pub mod engine;
pub mod fetch;
pub mod probe;
pub mod store;
pub mod sweep;
