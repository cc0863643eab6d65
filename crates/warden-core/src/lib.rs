//! Warden core - platform-independent types for the subprocess registry
//!
//! This crate provides the error taxonomy and configuration shared by the
//! process-management implementation in the `warden` crate.

mod config;
mod error;

pub use config::*;
pub use error::*;
