//! Intermediate representation (component D).
//!
//! Typed, three-address SSA-style IR the decoder emits into and the code
//! generator consumes from. `block`/`function` hold the arena; `operand`
//! and `instr` define the value/instruction shapes; `dump` renders either
//! for logs and tests.

pub mod block;
pub mod dump;
pub mod instr;
pub mod operand;
pub mod types;

pub use block::{BlockId, IrBasicBlock, IrFunction};
pub use dump::{dump_function, dump_instruction};
pub use instr::{IrInstruction, IrOpcode};
pub use operand::{IrOperand, MemoryOperand, NO_REGISTER};
pub use types::IrDataType;
