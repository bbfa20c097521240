use std::fmt;

use beef::lean::Cow;

use crate::chunk::{Chunk, Literal, LiteralPool};
use crate::opcode::{ExtOpcode, Opcode, OperandKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitError {
  /// A forward branch does not fit its reserved 16-bit offset.
  JumpTooFar,
  /// The literal table is full.
  LiteralLimit,
}

impl fmt::Display for EmitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EmitError::JumpTooFar => write!(f, "jump offset does not fit in 16 bits"),
      EmitError::LiteralLimit => write!(f, "too many literals in one chunk"),
    }
  }
}

impl std::error::Error for EmitError {}

/// A core or extended opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
  Cbc(Opcode),
  Ext(ExtOpcode),
}

impl Op {
  pub fn name(self) -> &'static str {
    match self {
      Op::Cbc(op) => op.name(),
      Op::Ext(op) => op.name(),
    }
  }

  pub fn operand(self) -> OperandKind {
    match self {
      Op::Cbc(op) => op.operand(),
      Op::Ext(op) => op.operand(),
    }
  }
}

impl From<Opcode> for Op {
  fn from(value: Opcode) -> Self {
    Op::Cbc(value)
  }
}

impl From<ExtOpcode> for Op {
  fn from(value: ExtOpcode) -> Self {
    Op::Ext(value)
  }
}

/// Inline operand of a buffered instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
  None,
  Literal(u16),
  Byte(u8),
}

/// The peephole slot: the most recent non-branch emission, held back so the
/// parser can merge, cancel, or replace it before it is committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pending {
  pub op: Op,
  pub operand: Operand,
}

impl Pending {
  /// The literal operand of an instruction known to carry one.
  pub fn literal_index(&self) -> u16 {
    match self.operand {
      Operand::Literal(index) => index,
      _ => panic!("instruction has no literal operand"),
    }
  }
}

/// Location of a forward branch whose offset is patched later.
///
/// Every handle must eventually be passed to [`Emitter::patch`]; dropping one
/// on an error path is fine (the whole chunk is discarded), dropping one on a
/// success path leaves a zero offset in the stream.
#[derive(Debug)]
#[must_use]
pub struct JumpHandle {
  /// Offset of the first byte of the branch instruction.
  instr: usize,
  /// Offset of its two offset bytes.
  operand: usize,
}

/// Append-only bytecode writer for a single chunk.
pub struct Emitter {
  name: Cow<'static, str>,
  code: Vec<u8>,
  literals: LiteralPool,
  last: Option<Pending>,
}

impl Emitter {
  pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
    Emitter {
      name: name.into(),
      code: Vec::new(),
      literals: LiteralPool::default(),
      last: None,
    }
  }

  /// Intern a literal, deduplicating where possible.
  pub fn literal(&mut self, literal: Literal) -> Result<u16, EmitError> {
    self.literals.insert(literal)
  }

  pub fn emit(&mut self, op: Opcode) {
    self.push_pending(Pending {
      op: Op::Cbc(op),
      operand: Operand::None,
    });
  }

  pub fn emit_ext(&mut self, op: ExtOpcode) {
    self.push_pending(Pending {
      op: Op::Ext(op),
      operand: Operand::None,
    });
  }

  pub fn emit_literal(&mut self, op: Opcode, index: u16) {
    debug_assert_eq!(op.operand(), OperandKind::Literal);
    self.push_pending(Pending {
      op: Op::Cbc(op),
      operand: Operand::Literal(index),
    });
  }

  pub fn emit_ext_literal(&mut self, op: ExtOpcode, index: u16) {
    debug_assert_eq!(op.operand(), OperandKind::Literal);
    self.push_pending(Pending {
      op: Op::Ext(op),
      operand: Operand::Literal(index),
    });
  }

  pub fn emit_byte(&mut self, op: Opcode, arg: u8) {
    debug_assert_eq!(op.operand(), OperandKind::Byte);
    self.push_pending(Pending {
      op: Op::Cbc(op),
      operand: Operand::Byte(arg),
    });
  }

  fn push_pending(&mut self, pending: Pending) {
    self.flush();
    self.last = Some(pending);
  }

  /// The peephole slot.
  pub fn last(&self) -> Option<&Pending> {
    self.last.as_ref()
  }

  /// Remove and return the peephole slot without committing it.
  pub fn take_last(&mut self) -> Option<Pending> {
    self.last.take()
  }

  /// Replace the peephole slot.
  pub fn set_last(&mut self, pending: Pending) {
    debug_assert!(self.last.is_none());
    self.last = Some(pending);
  }

  /// Drop the peephole slot; the buffered instruction is never emitted.
  pub fn cancel_last(&mut self) {
    self.last = None;
  }

  /// Commit the peephole slot to the stream.
  pub fn flush(&mut self) {
    let Some(pending) = self.last.take() else {
      return;
    };
    match pending.op {
      Op::Cbc(op) => self.code.push(op as u8),
      Op::Ext(op) => {
        self.code.push(Opcode::Ext as u8);
        self.code.push(op as u8);
      }
    }
    match pending.operand {
      Operand::None => {}
      Operand::Literal(index) => encode_literal_index(&mut self.code, index),
      Operand::Byte(byte) => self.code.push(byte),
    }
  }

  /// Current committed offset. Flushes the peephole slot.
  pub fn offset(&mut self) -> usize {
    self.flush();
    self.code.len()
  }

  /// Emit a forward branch with a reserved 16-bit offset, to be patched when
  /// the target is known.
  pub fn forward_branch(&mut self, op: Opcode) -> JumpHandle {
    self.flush();
    let instr = self.code.len();
    self.code.push(op.with_width(2) as u8);
    let operand = self.code.len();
    self.code.extend_from_slice(&[0, 0]);
    JumpHandle { instr, operand }
  }

  pub fn ext_forward_branch(&mut self, op: ExtOpcode) -> JumpHandle {
    self.flush();
    let instr = self.code.len();
    self.code.push(Opcode::Ext as u8);
    self.code.push(op.with_width(2) as u8);
    let operand = self.code.len();
    self.code.extend_from_slice(&[0, 0]);
    JumpHandle { instr, operand }
  }

  /// Point `handle` at the current position.
  pub fn patch(&mut self, handle: JumpHandle) -> Result<(), EmitError> {
    self.flush();
    let offset = self.code.len() - handle.instr;
    if offset > u16::MAX as usize {
      return Err(EmitError::JumpTooFar);
    }
    self.code[handle.operand] = (offset >> 8) as u8;
    self.code[handle.operand + 1] = offset as u8;
    Ok(())
  }

  /// Emit a backward branch to a known target, using the narrowest
  /// offset width that fits.
  pub fn backward_branch(&mut self, op: Opcode, target: usize) {
    self.flush();
    let offset = self.code.len() - target;
    let width = offset_width(offset);
    self.code.push(op.with_width(width) as u8);
    push_offset(&mut self.code, offset, width);
  }

  pub fn ext_backward_branch(&mut self, op: ExtOpcode, target: usize) {
    self.flush();
    let offset = self.code.len() - target;
    let width = offset_width(offset);
    self.code.push(Opcode::Ext as u8);
    self.code.push(op.with_width(width) as u8);
    push_offset(&mut self.code, offset, width);
  }

  pub fn finish(mut self, strict: bool, params: Vec<Box<str>>) -> Chunk {
    self.flush();
    Chunk {
      name: self.name,
      params,
      code: self.code,
      literals: self.literals.finish(),
      strict,
    }
  }
}

fn offset_width(offset: usize) -> u8 {
  if offset <= 0xFF {
    1
  } else if offset <= 0xFFFF {
    2
  } else {
    3
  }
}

fn push_offset(code: &mut Vec<u8>, offset: usize, width: u8) {
  debug_assert!(offset < 1 << (8 * width as usize));
  for shift in (0..width).rev() {
    code.push((offset >> (8 * shift as usize)) as u8);
  }
}

pub(crate) fn encode_literal_index(code: &mut Vec<u8>, index: u16) {
  if index < 0x80 {
    code.push(index as u8);
  } else {
    code.push(0x80 | (index >> 8) as u8);
    code.push(index as u8);
  }
}
