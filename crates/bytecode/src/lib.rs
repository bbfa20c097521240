//! The compact bytecode format.
//!
//! A compiled chunk is a flat byte stream of one-byte opcodes with inline
//! operands, plus a literal table. Extended opcodes live behind the
//! [`Opcode::Ext`] escape byte. Literal indices use a variable-length
//! encoding (one byte below `0x80`, two bytes otherwise); branch offsets
//! take one to three bytes depending on the distance, selected by the
//! opcode's width variant.

mod chunk;
mod decode;
mod disasm;
mod emitter;
mod opcode;

pub use chunk::{Chunk, Literal};
pub use decode::{read_instr, DecodeError, Decoded, Instr, InstrIter};
pub use emitter::{EmitError, Emitter, JumpHandle, Op, Operand, Pending};
pub use opcode::{ExtOpcode, Opcode, OperandKind};
