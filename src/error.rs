//! Host-facing error taxonomy.
//!
//! Mirrors the `jit_error_t` surface a host process observes: a small closed
//! set of outcomes, never a stringly-typed error. Translation failures are
//! recovered locally (see `exception`), so `JitError` is reserved for host
//! API misuse and unrecoverable internal states.

use thiserror::Error;

/// Error returned by host-facing JIT entry points.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitError {
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("jit engine not initialized")]
    NotInitialized,
    #[error("jit engine already initialized")]
    AlreadyInitialized,
    #[error("executable memory allocation failed")]
    MemoryAllocation,
    #[error("instruction decoding failed")]
    Decoding,
    #[error("translation failed")]
    Translation,
    #[error("generated code faulted during execution")]
    Execution,
    #[error("unsupported feature or operation")]
    Unsupported,
    #[error("internal invariant violated")]
    Internal,
}

pub type JitResult<T> = Result<T, JitError>;
