//! glance-executor - Statement execution coordination for SQL editors.
//!
//! This library exposes the core modules for use in integration tests.

pub mod backend;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod session;
pub mod statement;
