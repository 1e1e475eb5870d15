//! cliprelay - continuous video segment relay
//!
//! A producer records short segments and serves the latest one over TCP; any
//! number of consumers download them and play them back as one continuous
//! stream. This library crate exposes both sides for the binary and for
//! integration testing.

pub mod command;
pub mod config;
pub mod consumer;
pub mod producer;
