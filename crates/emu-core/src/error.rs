//! Core error type.

use thiserror::Error;

/// Structural errors raised while configuring the address space.
///
/// Every variant is a programming or data error: it is raised once at
/// configuration time and never retried.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("address space write map is empty")]
    EmptyWriteMap,

    #[error("read map has {read} banks, write map has {write}")]
    UnbalancedMaps { read: usize, write: usize },

    #[error("bank count {banks} is not a power of two")]
    BankCount { banks: usize },

    #[error("{banks} banks cannot evenly partition a {range:#x} byte range")]
    Partition { banks: usize, range: usize },

    #[error("bank size {bank_size:#x} is not a power of two")]
    BankSize { bank_size: usize },
}
