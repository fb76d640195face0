//! Shared types and utilities for the watchdesk engine crates.

pub mod id;
pub mod types;
