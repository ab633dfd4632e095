//! Dynamic binary translator core: executes 32-bit x86 guest code (with
//! MMX/SSE/x87 extensions) on 64-bit ARM hosts.
//!
//! Translation pipeline: [`decoder`] turns guest bytes into [`ir`], guarded
//! by [`eflags`] (condition-code derivation) and [`fpconv`]/[`simd`]
//! (floating-point and stack-register semantics); [`memory_model`] inserts
//! the barriers x86's TSO ordering needs on ARM's weaker model; [`codegen`]
//! defines the AArch64 backend contract; [`cache`] owns translated blocks
//! and their chaining; [`exception`] and [`error`] are the host-facing
//! fault and failure surfaces. [`api`] wires all of it into `JitEngine`.

pub mod api;
pub mod cache;
pub mod codegen;
pub mod decoder;
pub mod eflags;
pub mod error;
pub mod exception;
pub mod fpconv;
pub mod ir;
pub mod memory_model;
pub mod simd;

pub use api::JitEngine;
pub use error::{JitError, JitResult};
