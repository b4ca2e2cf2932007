//! Shared test constants

/// Model name the test server always rejects with 429.
pub const THROTTLED_MODEL: &str = "throttled-model";

/// Model name the test server answers normally.
pub const WORKING_MODEL: &str = "working-model";

/// Upper bound for any queue to drain in a test.
pub const DRAIN_TIMEOUT_SECS: u64 = 10;
