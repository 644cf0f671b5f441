//! tasknest library
//!
//! This module exports the core components for testing and integration.

pub mod cli;
pub mod config;
pub mod error;
pub mod guard;
pub mod http;
pub mod seed;
pub mod store;
pub mod types;
