//! Convenience re-exports for common test utilities.
//!
//! ```rust,ignore
//! use bic_test_helpers::prelude::*;
//! ```

pub use crate::must::{must, must_err, must_some, must_with};

#[cfg(feature = "mock")]
pub use crate::must::must_async;

#[cfg(feature = "mock")]
pub use crate::mock::{
    Call, CallLog, MockEventSink, MockFirmwareWriter, MockHardware, MockMonitor, MockRegulator,
    MockRetimer, MockStraps,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
