//! x87/MMX/SSE register file and transcendental math (component B).

pub mod state;
pub mod transcendental;

pub use state::{SimdMode, SimdState, X87Register, X87TagStatus};
