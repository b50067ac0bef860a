//! STONKS Paper Trading Backend Library
//!
//! Core components of the paper-trading backend: the order monitoring and
//! execution engine plus the ledger and market-data seams it runs against.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
pub mod task_runner;
