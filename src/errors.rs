//! Error kinds that are allowed to cross the Registry/Oracle boundary.
//!
//! Per the error-handling design: transient network, protocol, decode,
//! and logical-rejection errors are recovered locally by the component
//! that hit them and never propagate past it. Only `NotAvailable`,
//! `Busy`, and `Fatal` are visible to callers of the Registry/Oracle API.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("no price tier produced a value within the requested constraints")]
    NotAvailable,
    #[error("registry capacity exhausted: {0}")]
    Busy(String),
    #[error("fatal: {0}")]
    Fatal(String),
}
