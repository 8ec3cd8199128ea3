//! Property-based tests for maintenance selection and driver progress

mod monotonic_progress;
