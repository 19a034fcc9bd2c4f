//! Integration tests for the wellfit-rs library
//!
//! This module organizes all integration tests that test the library as a whole,
//! rather than individual components.

// End-to-end fitting and sensitivity sweeps
pub mod end_to_end;

// Optimizer behavior on synthetic well-test data
pub mod fitting;

// Background fits, cancellation and persisted state
pub mod session;
