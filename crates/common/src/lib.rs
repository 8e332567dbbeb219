//! Shared ambient pieces for the workspace binaries and tests

pub mod structured_logging;

pub use structured_logging::{
    init_structured_logging,
    init_test_logging,
    JsonFormatter,
    LoggingConfig,
    OperationTimer,
    ProcessContext,
    StructuredLogEntry,
};
