//! Integration tests for glance-executor.

pub mod config_test;
pub mod editing_test;
pub mod session_test;
