//! IR basic blocks and functions (component D).
//!
//! `IrFunction` owns all blocks in an arena (`Vec`) addressed by index, the
//! same cyclic-reference dodge the teacher uses for its `DecodeCache` keys:
//! blocks reference each other by `BlockId` rather than by pointer/`Rc`, so
//! control-flow cycles (loops) need no unsafe code or reference counting.

use super::instr::IrInstruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone)]
pub struct IrBasicBlock {
    pub id: BlockId,
    /// Guest address of this block's first instruction.
    pub start_address: u32,
    pub instructions: Vec<IrInstruction>,
    /// Successor blocks within the same function, if statically known.
    pub successors: Vec<BlockId>,
}

impl IrBasicBlock {
    pub fn new(id: BlockId, start_address: u32) -> Self {
        Self {
            id,
            start_address,
            instructions: Vec::new(),
            successors: Vec::new(),
        }
    }

    pub fn push(&mut self, instruction: IrInstruction) {
        self.instructions.push(instruction);
    }
}

/// A translation unit: one or more basic blocks produced from a single
/// decode pass starting at a guest entry address.
#[derive(Debug, Clone)]
pub struct IrFunction {
    pub entry_address: u32,
    blocks: Vec<IrBasicBlock>,
}

impl IrFunction {
    pub fn new(entry_address: u32) -> Self {
        Self { entry_address, blocks: Vec::new() }
    }

    pub fn add_block(&mut self, start_address: u32) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(IrBasicBlock::new(id, start_address));
        id
    }

    pub fn block(&self, id: BlockId) -> &IrBasicBlock {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut IrBasicBlock {
        &mut self.blocks[id.0 as usize]
    }

    pub fn blocks(&self) -> impl Iterator<Item = &IrBasicBlock> {
        self.blocks.iter()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}
