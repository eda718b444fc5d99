//! Observability for the compilation engine
//!
//! Structured logging only. The read path (compilation) is pure and silent;
//! log lines are emitted solely by the manifest write path (provisioning)
//! and by the documented primary-key truncation warning.
//!
//! Principles:
//! 1. One log line = one event
//! 2. Deterministic key ordering
//! 3. Synchronous, no buffering, no background threads
//! 4. Errors are never downgraded to log lines; they return as typed results

mod logger;

pub use logger::{Logger, Severity};
