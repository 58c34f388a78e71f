//! Detector implementations for tests and smoke runs.

mod mock_detector;

pub use mock_detector::*;
