//! Security audit: content scanning and the threshold gate
//!
//! [`scanner`] defines the scan contract (severities, findings, risk score)
//! and a default pattern-based scanner. [`gate`] wraps a scanner with
//! threshold policy, interactive/non-interactive decision logic, and
//! rollback of partially-applied state.

pub mod gate;
pub mod scanner;

pub use gate::{AuditGate, GatePass, Prompt, RollbackPoint};
pub use scanner::{AuditResult, ContentScanner, Finding, PatternScanner, Severity};
